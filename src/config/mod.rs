//! config/mod.rs
//! Configuración del proceso (servidor, proveedor) y del ciclo de vida de las activaciones.

pub mod app_config;
pub mod lifecycle_config;
