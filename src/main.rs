use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use sqlx::{Pool, Sqlite};

use crate::config::app_config::AppConfig;
use crate::config::lifecycle_config::LifecycleConfig;
use crate::logger::init_logger;
use crate::services::clock::SystemClock;
use crate::services::event_sink::BroadcastSink;
use crate::services::provider_gateway::ProviderGateway;
use crate::services::scheduler_service::LifecycleScheduler;
use crate::services::store_service::{ActivationStore, SqliteStore};

mod app;
mod config;
mod errors;
mod handlers;
mod logger;
mod models;
mod services;
#[cfg(test)]
mod tests;

async fn setup_database(config: &AppConfig) -> Pool<Sqlite> {
    // 1) Crear carpeta de datos
    std::fs::create_dir_all(&config.data_dir).expect("No se pudo crear la carpeta de datos");

    // 2) Conectarnos con SQLx (el archivo se crea si no existe)
    let db_url = config.database_url();
    log::info!("Conectando a SQLite en {}", db_url);

    Pool::<Sqlite>::connect(&db_url)
        .await
        .expect("No se pudo conectar a la base de datos SQLite")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let app_config = AppConfig::from_env();
    let lifecycle_config = match LifecycleConfig::from_env() {
        Ok(config) => config,
        Err(e) => panic!("Configuración del ciclo de vida inválida: {:?}", e),
    };

    let db_pool = setup_database(&app_config).await;
    let store = SqliteStore::new(db_pool.clone());
    if let Err(e) = store.run_migrations().await {
        panic!("Fallo al correr migraciones: {:?}", e);
    }
    let store_dyn: Arc<dyn ActivationStore> = Arc::new(store.clone());

    // Proveedor: key del entorno o la guardada en la DB
    let gateway = ProviderGateway::new(
        store_dyn.clone(),
        &app_config.provider_base_url,
        app_config.provider_timeout,
    );
    let api_key = match app_config.api_key.clone() {
        Some(key) => Some(key),
        None => store.get_api_key().await.unwrap_or_else(|e| {
            log::warn!("No se pudo leer la API key guardada: {:?}", e);
            None
        }),
    };
    if let Some(key) = api_key {
        if let Err(e) = gateway.configure(&key) {
            log::warn!("API key guardada rechazada: {}", e);
        }
    }
    if !gateway.is_configured() {
        log::warn!("Sin API key configurada; las llamadas al proveedor fallarán hasta que se guarde una");
    }

    let sink = BroadcastSink::default();
    let scheduler = LifecycleScheduler::new(
        Arc::new(gateway.clone()),
        store_dyn,
        Arc::new(sink.clone()),
        Arc::new(SystemClock),
        lifecycle_config,
    );

    // Retomar las activaciones que quedaron vivas
    if let Err(e) = scheduler.recover().await {
        log::error!("Fallo en la recuperación: {}", e);
    }

    log::info!(
        "Escuchando en {}:{}",
        app_config.bind_addr,
        app_config.port
    );
    let server_scheduler = scheduler.clone();
    let result = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(server_scheduler.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(sink.clone()))
            .configure(app::init_app)
    })
    .workers(1)
    .bind((app_config.bind_addr.as_str(), app_config.port))?
    .run()
    .await;

    scheduler.shutdown();
    db_pool.close().await;
    result
}
