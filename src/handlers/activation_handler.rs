//! handlers/activation_handler.rs
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::handlers::response::{internal_error, scheduler_error};
use crate::models::activation_model::{
    ListActivationsResponse, RequestNumberRequest, RequestNumberResponse,
};
use crate::models::provider_model::NumberQuery;
use crate::services::catalog::{country_code, service_code};
use crate::services::scheduler_service::LifecycleScheduler;
use crate::services::store_service::{ActivationStore, SqliteStore};

/// POST /api/activations
pub async fn request_number_endpoint(
    scheduler: web::Data<LifecycleScheduler>,
    body: web::Json<RequestNumberRequest>,
) -> HttpResponse {
    let req = body.into_inner();
    let query = NumberQuery {
        service: service_code(&req.service).to_string(),
        country: country_code(&req.country).to_string(),
        operators: req.operators,
        max_price: req.max_price,
        ref_code: req.ref_code,
    };

    match scheduler.request_number(query).await {
        Ok(activation) => HttpResponse::Ok().json(RequestNumberResponse {
            success: true,
            data: activation,
        }),
        Err(e) => {
            log::warn!("Falló la renta de número: {}", e);
            scheduler_error(&e)
        }
    }
}

/// GET /api/activations
pub async fn list_activations_endpoint(store: web::Data<SqliteStore>) -> HttpResponse {
    match store.list_non_terminal_activations().await {
        Ok(items) => HttpResponse::Ok().json(ListActivationsResponse {
            total: items.len(),
            items,
        }),
        Err(e) => internal_error(&e),
    }
}

/// GET /api/activations/{id}
pub async fn get_activation_endpoint(
    store: web::Data<SqliteStore>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();

    match store.get_activation(&id).await {
        Ok(Some(activation)) => HttpResponse::Ok().json(activation),
        Ok(None) => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": format!("activación {} no encontrada", id)
        })),
        Err(e) => internal_error(&e),
    }
}

/// GET /api/activations/{id}/messages
pub async fn list_messages_endpoint(
    store: web::Data<SqliteStore>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();

    match store.list_messages(&id).await {
        Ok(messages) => HttpResponse::Ok().json(json!({
            "success": true,
            "data": messages
        })),
        Err(e) => internal_error(&e),
    }
}

/// GET /api/activations/{id}/schedule
pub async fn schedule_endpoint(
    scheduler: web::Data<LifecycleScheduler>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();

    match scheduler.registry().snapshot(&id) {
        Some(snapshot) => HttpResponse::Ok().json(json!({
            "success": true,
            "data": snapshot
        })),
        None => HttpResponse::NotFound().json(json!({
            "success": false,
            "error": format!("la activación {} no está siendo vigilada", id)
        })),
    }
}

/// POST /api/activations/{id}/release
pub async fn release_endpoint(
    scheduler: web::Data<LifecycleScheduler>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();

    match scheduler.release(&id).await {
        Ok(activation) => HttpResponse::Ok().json(json!({
            "success": true,
            "data": activation
        })),
        Err(e) => {
            log::warn!("Falló el release manual de id={}: {}", id, e);
            scheduler_error(&e)
        }
    }
}

/// POST /api/activations/{id}/resend
pub async fn resend_endpoint(
    scheduler: web::Data<LifecycleScheduler>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();

    match scheduler.request_resend(&id).await {
        Ok(ack) => HttpResponse::Ok().json(json!({
            "success": true,
            "response": ack.raw
        })),
        Err(e) => scheduler_error(&e),
    }
}
