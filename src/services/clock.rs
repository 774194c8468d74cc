//! services/clock.rs
//! Fuente de tiempo del scheduler. Todo "ahora" dentro de un timer pasa por aquí.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Espera hasta `deadline`; cero si ya pasó.
pub fn delay_until(now: DateTime<Utc>, deadline: DateTime<Utc>) -> std::time::Duration {
    (deadline - now).to_std().unwrap_or_default()
}
