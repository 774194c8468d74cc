//! models/provider_model.rs
//! Resultados tipados de las llamadas al proveedor de SMS.

use serde::{Deserialize, Serialize};

/// Las respuestas con este prefijo cuentan como éxito (`ACCESS_CANCEL`,
/// `ACCESS_RETRY_GET`, `ACCESS_ACTIVATION`, ...).
pub const SUCCESS_PREFIX: &str = "ACCESS_";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberGrant {
    pub id: String,
    pub phone_number: String,
    pub operator: Option<String>,
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum RemoteStatus {
    Waiting,
    Received(Option<String>),
    Cancelled,
    /// Cualquier otra respuesta, tal cual llegó.
    Unknown(String),
}

impl RemoteStatus {
    /// `STATUS_WAIT_CODE`, `STATUS_OK:<code>` y `STATUS_CANCEL` se mapean tal cual;
    /// el resto es `Unknown`.
    pub fn from_wire(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "STATUS_WAIT_CODE" {
            return RemoteStatus::Waiting;
        }
        if raw == "STATUS_CANCEL" {
            return RemoteStatus::Cancelled;
        }
        if let Some(code) = raw.strip_prefix("STATUS_OK:") {
            let code = code.trim();
            let message = (!code.is_empty()).then(|| code.to_string());
            return RemoteStatus::Received(message);
        }
        RemoteStatus::Unknown(raw.to_string())
    }
}

/// Respuesta cruda de una llamada a `setStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAck {
    pub raw: String,
}

impl ProviderAck {
    pub fn new(raw: impl Into<String>) -> Self {
        ProviderAck { raw: raw.into() }
    }

    pub fn is_success(&self) -> bool {
        self.raw.trim_start().starts_with(SUCCESS_PREFIX)
    }
}

/// Códigos de la acción `setStatus` del proveedor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetStatusCode {
    RequestResend = 3,
    Finish = 6,
    Cancel = 8,
}

/// Parámetros de `getNumberV2`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberQuery {
    pub service: String,
    pub country: String,
    pub operators: Vec<String>,
    pub max_price: Option<f64>,
    pub ref_code: Option<String>,
}
