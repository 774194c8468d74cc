//! services/mod.rs
pub mod catalog;
pub mod clock;
pub mod event_sink;
pub mod lifecycle;
pub mod provider_gateway;
pub mod provider_service;
pub mod registry;
pub mod scheduler_service;
pub mod store_service;
