use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationStatus {
    Active,
    Waiting,
    Received,
    Cancelled,
    Released,
    Completed,
}

impl ActivationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActivationStatus::Cancelled | ActivationStatus::Released | ActivationStatus::Completed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivationStatus::Active => "active",
            ActivationStatus::Waiting => "waiting",
            ActivationStatus::Received => "received",
            ActivationStatus::Cancelled => "cancelled",
            ActivationStatus::Released => "released",
            ActivationStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ActivationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ActivationStatus::Active),
            "waiting" => Ok(ActivationStatus::Waiting),
            "received" => Ok(ActivationStatus::Received),
            "cancelled" => Ok(ActivationStatus::Cancelled),
            "released" => Ok(ActivationStatus::Released),
            "completed" => Ok(ActivationStatus::Completed),
            other => Err(anyhow::anyhow!("estado de activación desconocido: {other}")),
        }
    }
}

/// Un número rentado, desde que el proveedor lo concede hasta un estado terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activation {
    pub id: String,
    pub phone_number: String,
    pub service: String,
    pub country: String,
    pub operator: Option<String>,
    pub status: ActivationStatus,
    pub cost: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl Activation {
    /// Instante del auto-release: `expires_at - lead`.
    pub fn release_at(&self, lead: chrono::Duration) -> DateTime<Utc> {
        self.expires_at - lead
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmsMessage {
    pub activation_id: String,
    pub message: String,
    pub received_at: DateTime<Utc>,
}

/// Request para rentar un número
#[derive(Debug, Clone, Deserialize)]
pub struct RequestNumberRequest {
    pub service: String,
    pub country: String,
    #[serde(default)]
    pub operators: Vec<String>,
    pub max_price: Option<f64>,
    pub ref_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestNumberResponse {
    pub success: bool,
    pub data: Activation,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListActivationsResponse {
    pub total: usize,
    pub items: Vec<Activation>,
}
