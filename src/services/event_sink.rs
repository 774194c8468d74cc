//! services/event_sink.rs
//! Destino de las notificaciones del ciclo de vida. Fire-and-forget.

use tokio::sync::broadcast;

use crate::models::event_model::LifecycleNotification;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: LifecycleNotification);
}

/// Reparte a todos los suscriptores (el endpoint SSE). Enviar sin nadie
/// escuchando no es un error.
#[derive(Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<LifecycleNotification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        BroadcastSink { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleNotification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        BroadcastSink::new(256)
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: LifecycleNotification) {
        log::info!("evento {} id={}", event.name(), event.activation_id());
        let _ = self.tx.send(event);
    }
}
