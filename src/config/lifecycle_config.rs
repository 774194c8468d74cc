//! config/lifecycle_config.rs
//! Tiempos del ciclo de vida de una activación (renta, release, polling, confirmación).

use std::time::Duration;

use anyhow::{ensure, Result};

use crate::config::app_config::env_parse;

/// Límite de la renta: el proveedor nunca concede más de un día.
pub const MAX_LEASE: Duration = Duration::from_secs(24 * 60 * 60);

/// Tiempos que usa el scheduler. Por defecto siguen las reglas de renta del proveedor:
/// 20 minutos de renta y auto-release 2 minutos antes del final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub lease: Duration,
    pub release_lead: Duration,
    pub poll_interval: Duration,
    pub resend_delay: Duration,
    pub release_confirm_attempts: u32,
    pub release_confirm_interval: Duration,
    pub manual_confirm_attempts: u32,
    pub manual_confirm_interval: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        LifecycleConfig {
            lease: Duration::from_secs(20 * 60),
            release_lead: Duration::from_secs(2 * 60),
            poll_interval: Duration::from_secs(5),
            resend_delay: Duration::from_secs(5),
            release_confirm_attempts: 3,
            release_confirm_interval: Duration::from_secs(1),
            manual_confirm_attempts: 3,
            manual_confirm_interval: Duration::from_millis(500),
        }
    }
}

impl LifecycleConfig {
    pub fn from_env() -> Result<Self> {
        let d = LifecycleConfig::default();

        let config = LifecycleConfig {
            lease: env_parse("SMS_LEASE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.lease),
            release_lead: env_parse("SMS_RELEASE_LEAD_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.release_lead),
            poll_interval: env_parse("SMS_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.poll_interval),
            resend_delay: env_parse("SMS_RESEND_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.resend_delay),
            release_confirm_attempts: env_parse("SMS_RELEASE_CONFIRM_ATTEMPTS")
                .unwrap_or(d.release_confirm_attempts),
            release_confirm_interval: env_parse("SMS_RELEASE_CONFIRM_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.release_confirm_interval),
            manual_confirm_attempts: env_parse("SMS_MANUAL_CONFIRM_ATTEMPTS")
                .unwrap_or(d.manual_confirm_attempts),
            manual_confirm_interval: env_parse("SMS_MANUAL_CONFIRM_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.manual_confirm_interval),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.lease.is_zero(), "la renta debe ser mayor que cero");
        ensure!(
            self.lease <= MAX_LEASE,
            "la renta ({:?}) no puede superar {:?}",
            self.lease,
            MAX_LEASE
        );
        ensure!(
            self.release_lead < self.lease,
            "la antelación del release ({:?}) debe ser menor que la renta ({:?})",
            self.release_lead,
            self.lease
        );
        ensure!(!self.poll_interval.is_zero(), "el intervalo de polling debe ser mayor que cero");
        Ok(())
    }

    pub fn lease_delta(&self) -> chrono::Duration {
        to_chrono(self.lease)
    }

    pub fn release_lead_delta(&self) -> chrono::Duration {
        to_chrono(self.release_lead)
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::max_value())
}
