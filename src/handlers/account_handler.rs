//! handlers/account_handler.rs
//! API key, saldo y el switch del log de auditoría.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::handlers::response::{internal_error, provider_error};
use crate::services::provider_gateway::ProviderGateway;
use crate::services::provider_service::ProviderClient;
use crate::services::store_service::SqliteStore;

#[derive(Deserialize)]
pub struct ApiKeyBody {
    api_key: String,
}

#[derive(Deserialize)]
pub struct LoggingBody {
    enabled: bool,
}

/// GET /api/balance
pub async fn balance_endpoint(
    gateway: web::Data<ProviderGateway>,
    store: web::Data<SqliteStore>,
) -> HttpResponse {
    match gateway.get_balance().await {
        Ok(balance) => {
            if let Err(e) = store.save_balance(balance).await {
                log::warn!("No se pudo guardar el saldo: {:?}", e);
            }
            HttpResponse::Ok().json(json!({
                "success": true,
                "balance": balance
            }))
        }
        Err(e) => provider_error(&e),
    }
}

/// GET /api/config
pub async fn get_config_endpoint(store: web::Data<SqliteStore>) -> HttpResponse {
    match store.get_api_config().await {
        Ok(config) => HttpResponse::Ok().json(config),
        Err(e) => internal_error(&e),
    }
}

/// PUT /api/config/api-key
pub async fn save_api_key_endpoint(
    gateway: web::Data<ProviderGateway>,
    store: web::Data<SqliteStore>,
    body: web::Json<ApiKeyBody>,
) -> HttpResponse {
    let api_key = body.into_inner().api_key;

    // Primero validar (cliente construible), después persistir
    if let Err(e) = gateway.configure(&api_key) {
        return provider_error(&e);
    }
    match store.save_api_key(api_key.trim()).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => internal_error(&e),
    }
}

/// PUT /api/config/logging
pub async fn set_logging_endpoint(
    store: web::Data<SqliteStore>,
    body: web::Json<LoggingBody>,
) -> HttpResponse {
    let enabled = body.into_inner().enabled;

    match store.set_logging_enabled(enabled).await {
        Ok(()) => {
            log::info!("Log de auditoría del proveedor {}", if enabled { "activado" } else { "desactivado" });
            HttpResponse::Ok().json(json!({ "success": true, "enabled": enabled }))
        }
        Err(e) => internal_error(&e),
    }
}
