//! models/event_model.rs
//! Notificaciones que emite el scheduler para quien escuche (SSE, logs).

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseReason {
    AutoRelease,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum LifecycleNotification {
    #[serde(rename_all = "camelCase")]
    SmsReceived {
        id: String,
        phone_number: String,
        message: String,
        received_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    NumberReleased { id: String, reason: ReleaseReason },
}

impl LifecycleNotification {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleNotification::SmsReceived { .. } => "sms-received",
            LifecycleNotification::NumberReleased { .. } => "number-released",
        }
    }

    pub fn activation_id(&self) -> &str {
        match self {
            LifecycleNotification::SmsReceived { id, .. } => id,
            LifecycleNotification::NumberReleased { id, .. } => id,
        }
    }
}
