//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod activation_model;
pub mod api_log_model;
pub mod event_model;
pub mod provider_model;
