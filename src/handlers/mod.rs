//! handlers/mod.rs
//! Módulo que agrupa los handlers HTTP (activaciones, cuenta, logs, eventos).
pub mod account_handler;
pub mod activation_handler;
pub mod event_handler;
pub mod log_handler;
pub mod response;
