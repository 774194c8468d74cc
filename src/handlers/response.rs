//! handlers/response.rs
//! Mapeo de errores del scheduler/proveedor a respuestas HTTP.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;

use crate::errors::{ProviderError, SchedulerError};

pub fn scheduler_status(err: &SchedulerError) -> StatusCode {
    match err {
        SchedulerError::Provider(e) => provider_status(e),
        SchedulerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        SchedulerError::NotFound(_) => StatusCode::NOT_FOUND,
        SchedulerError::AlreadyTerminal { .. } => StatusCode::CONFLICT,
        SchedulerError::ConfirmationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

pub fn provider_status(err: &ProviderError) -> StatusCode {
    match err {
        ProviderError::Precondition(_) => StatusCode::PRECONDITION_FAILED,
        ProviderError::Logical(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ProviderError::Transport(_) | ProviderError::Malformed(_) => StatusCode::BAD_GATEWAY,
    }
}

pub fn scheduler_error(err: &SchedulerError) -> HttpResponse {
    let status = scheduler_status(err);
    if status.is_server_error() {
        log::error!("Falló la petición: {:?}", err);
    }
    failure(status, err.to_string())
}

pub fn provider_error(err: &ProviderError) -> HttpResponse {
    failure(provider_status(err), err.to_string())
}

pub fn internal_error(err: &anyhow::Error) -> HttpResponse {
    log::error!("Error interno: {:?}", err);
    failure(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err))
}

fn failure(status: StatusCode, message: String) -> HttpResponse {
    HttpResponse::build(status).json(json!({
        "success": false,
        "error": message
    }))
}
