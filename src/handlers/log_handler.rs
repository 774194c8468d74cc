//! handlers/log_handler.rs
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::handlers::response::internal_error;
use crate::models::api_log_model::ApiLogFilter;
use crate::services::store_service::SqliteStore;

/// GET /api/logs?action=&start=&end=&limit=&offset=
pub async fn list_logs_endpoint(
    store: web::Data<SqliteStore>,
    query: web::Query<ApiLogFilter>,
) -> HttpResponse {
    match store.list_api_logs(&query).await {
        Ok(rows) => HttpResponse::Ok().json(json!({
            "success": true,
            "data": rows
        })),
        Err(e) => internal_error(&e),
    }
}

/// GET /api/logs/actions
pub async fn list_actions_endpoint(store: web::Data<SqliteStore>) -> HttpResponse {
    match store.list_api_actions().await {
        Ok(actions) => HttpResponse::Ok().json(json!({
            "success": true,
            "data": actions
        })),
        Err(e) => internal_error(&e),
    }
}
