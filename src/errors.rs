//! errors.rs
//! Taxonomía de errores de la capa del proveedor y del scheduler.

use thiserror::Error;

use crate::models::activation_model::ActivationStatus;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Falla de red, timeout o respuesta no-2xx.
    #[error("error de transporte con el proveedor: {0}")]
    Transport(String),
    /// El proveedor respondió con un error conocido (`NO_NUMBERS`, `BAD_KEY`, ...).
    #[error("el proveedor rechazó la petición: {0}")]
    Logical(String),
    #[error("respuesta inesperada del proveedor: {0}")]
    Malformed(String),
    /// Se usó el cliente antes de configurar una API key.
    #[error("proveedor no disponible: {0}")]
    Precondition(String),
}

impl ProviderError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ProviderError::Transport(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
    #[error("activación {0} no encontrada")]
    NotFound(String),
    #[error("la activación {id} ya está {status}")]
    AlreadyTerminal { id: String, status: ActivationStatus },
    /// Se pidió la cancelación pero el proveedor nunca la confirmó.
    #[error("el proveedor no confirmó la cancelación de la activación {0}")]
    ConfirmationTimeout(String),
}
