//! app.rs
use crate::handlers::{account_handler, activation_handler, event_handler, log_handler};
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/activations")
                    .route(
                        "",
                        web::post().to(activation_handler::request_number_endpoint),
                    )
                    .route(
                        "",
                        web::get().to(activation_handler::list_activations_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::get().to(activation_handler::get_activation_endpoint),
                    )
                    .route(
                        "/{id}/messages",
                        web::get().to(activation_handler::list_messages_endpoint),
                    )
                    .route(
                        "/{id}/schedule",
                        web::get().to(activation_handler::schedule_endpoint),
                    )
                    .route(
                        "/{id}/release",
                        web::post().to(activation_handler::release_endpoint),
                    )
                    .route(
                        "/{id}/resend",
                        web::post().to(activation_handler::resend_endpoint),
                    ),
            )
            .route("/balance", web::get().to(account_handler::balance_endpoint))
            .service(
                web::scope("/config")
                    .route("", web::get().to(account_handler::get_config_endpoint))
                    .route(
                        "/api-key",
                        web::put().to(account_handler::save_api_key_endpoint),
                    )
                    .route(
                        "/logging",
                        web::put().to(account_handler::set_logging_endpoint),
                    ),
            )
            .service(
                web::scope("/logs")
                    .route("", web::get().to(log_handler::list_logs_endpoint))
                    .route(
                        "/actions",
                        web::get().to(log_handler::list_actions_endpoint),
                    ),
            )
            .route("/events", web::get().to(event_handler::events_endpoint)),
    );
}
