//! tests/support.rs
//! Dobles de prueba: store en memoria, proveedor programable, sink que graba y
//! un reloj que avanza con el tiempo virtual de tokio.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;

use crate::config::lifecycle_config::LifecycleConfig;
use crate::errors::ProviderError;
use crate::models::activation_model::{Activation, ActivationStatus, SmsMessage};
use crate::models::api_log_model::ApiLogRecord;
use crate::models::event_model::LifecycleNotification;
use crate::models::provider_model::{NumberGrant, NumberQuery, ProviderAck, RemoteStatus};
use crate::services::clock::Clock;
use crate::services::event_sink::EventSink;
use crate::services::provider_service::ProviderClient;
use crate::services::scheduler_service::LifecycleScheduler;
use crate::services::store_service::{ActivationStore, SqliteStore};

pub fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
}

/// Reloj anclado en `origin()` que avanza con el reloj (pausado) de tokio.
pub struct TokioClock {
    wall: DateTime<Utc>,
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        TokioClock {
            wall: origin(),
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now() - self.start;
        self.wall + chrono::Duration::from_std(elapsed).unwrap()
    }
}

// --------------------------------------------------------------------------------
// Store en memoria
// --------------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    activations: Mutex<HashMap<String, Activation>>,
    messages: Mutex<Vec<SmsMessage>>,
    history: Mutex<Vec<(String, ActivationStatus)>>,
    api_logs: Mutex<Vec<ApiLogRecord>>,
    logging: AtomicBool,
    failing_writes: Mutex<Vec<ActivationStatus>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_of(&self, id: &str) -> Option<ActivationStatus> {
        self.activations.lock().unwrap().get(id).map(|a| a.status)
    }

    pub fn activation(&self, id: &str) -> Activation {
        self.activations.lock().unwrap().get(id).cloned().unwrap()
    }

    /// Writes de estado de `id`, en orden.
    pub fn history(&self, id: &str) -> Vec<ActivationStatus> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|(h_id, _)| h_id == id)
            .map(|(_, status)| *status)
            .collect()
    }

    pub fn message_count(&self, id: &str) -> usize {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.activation_id == id)
            .count()
    }

    /// El próximo write de `status` falla una vez, como con la base bloqueada.
    pub fn fail_next_write_of(&self, status: ActivationStatus) {
        self.failing_writes.lock().unwrap().push(status);
    }

    pub fn set_logging(&self, enabled: bool) {
        self.logging.store(enabled, Ordering::SeqCst);
    }

    pub fn api_logs(&self) -> Vec<ApiLogRecord> {
        self.api_logs.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.activations.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ActivationStore for MemoryStore {
    async fn save_activation(&self, activation: &Activation) -> Result<()> {
        let mut activations = self.activations.lock().unwrap();
        anyhow::ensure!(
            !activations.contains_key(&activation.id),
            "duplicate activation {}",
            activation.id
        );
        activations.insert(activation.id.clone(), activation.clone());
        Ok(())
    }

    async fn get_activation(&self, id: &str) -> Result<Option<Activation>> {
        Ok(self.activations.lock().unwrap().get(id).cloned())
    }

    async fn update_status(
        &self,
        id: &str,
        status: ActivationStatus,
        released_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        {
            let mut failing = self.failing_writes.lock().unwrap();
            if let Some(pos) = failing.iter().position(|s| *s == status) {
                failing.remove(pos);
                anyhow::bail!("database is locked");
            }
        }
        let mut activations = self.activations.lock().unwrap();
        match activations.get_mut(id) {
            Some(a) if !a.status.is_terminal() => {
                a.status = status;
                if released_at.is_some() {
                    a.released_at = released_at;
                }
                self.history.lock().unwrap().push((id.to_string(), status));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_non_terminal_activations(&self) -> Result<Vec<Activation>> {
        Ok(self
            .activations
            .lock()
            .unwrap()
            .values()
            .filter(|a| !a.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn save_message(&self, id: &str, text: &str, received_at: DateTime<Utc>) -> Result<()> {
        self.messages.lock().unwrap().push(SmsMessage {
            activation_id: id.to_string(),
            message: text.to_string(),
            received_at,
        });
        Ok(())
    }

    async fn list_messages(&self, id: &str) -> Result<Vec<SmsMessage>> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.activation_id == id)
            .cloned()
            .collect())
    }

    async fn get_logging_enabled(&self) -> Result<bool> {
        Ok(self.logging.load(Ordering::SeqCst))
    }

    async fn save_api_log(&self, record: &ApiLogRecord) -> Result<()> {
        self.api_logs.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// --------------------------------------------------------------------------------
// Proveedor programable
// --------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelBehavior {
    /// `ACCESS_CANCEL`; el estado remoto pasa a cancelado.
    Accept,
    /// Responde el texto dado (no exitoso); nada cambia en remoto.
    Deny(String),
    /// La cancelación se aplica en remoto pero la respuesta se pierde.
    LostAfterCancel,
}

pub struct FakeProvider {
    statuses: Mutex<HashMap<String, RemoteStatus>>,
    status_calls: Mutex<HashMap<String, usize>>,
    cancel_behavior: Mutex<CancelBehavior>,
    request_error: Mutex<Option<String>>,
    fail_status: AtomicBool,
    next_id: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub resend_calls: AtomicUsize,
    pub finish_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        FakeProvider {
            statuses: Mutex::new(HashMap::new()),
            status_calls: Mutex::new(HashMap::new()),
            cancel_behavior: Mutex::new(CancelBehavior::Accept),
            request_error: Mutex::new(None),
            fail_status: AtomicBool::new(false),
            next_id: AtomicUsize::new(1000),
            cancel_calls: AtomicUsize::new(0),
            resend_calls: AtomicUsize::new(0),
            finish_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_status(&self, id: &str, status: RemoteStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(id.to_string(), status);
    }

    pub fn set_cancel_behavior(&self, behavior: CancelBehavior) {
        *self.cancel_behavior.lock().unwrap() = behavior;
    }

    pub fn fail_requests_with(&self, raw: &str) {
        *self.request_error.lock().unwrap() = Some(raw.to_string());
    }

    pub fn set_status_failing(&self, failing: bool) {
        self.fail_status.store(failing, Ordering::SeqCst);
    }

    pub fn status_calls(&self, id: &str) -> usize {
        self.status_calls
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    pub fn cancels(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn resends(&self) -> usize {
        self.resend_calls.load(Ordering::SeqCst)
    }

    pub fn finishes(&self) -> usize {
        self.finish_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    async fn request_number(&self, _query: &NumberQuery) -> Result<NumberGrant, ProviderError> {
        if let Some(raw) = self.request_error.lock().unwrap().clone() {
            return Err(ProviderError::Logical(raw));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(NumberGrant {
            id: n.to_string(),
            phone_number: format!("1555000{n}"),
            operator: Some("tmobile".to_string()),
            cost: Some(0.25),
        })
    }

    async fn get_status(&self, id: &str) -> Result<RemoteStatus, ProviderError> {
        *self
            .status_calls
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_insert(0) += 1;

        if self.fail_status.load(Ordering::SeqCst) {
            return Err(ProviderError::Transport("connection reset".to_string()));
        }
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or(RemoteStatus::Waiting))
    }

    async fn cancel(&self, id: &str) -> Result<ProviderAck, ProviderError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.cancel_behavior.lock().unwrap().clone();
        match behavior {
            CancelBehavior::Accept => {
                self.set_status(id, RemoteStatus::Cancelled);
                Ok(ProviderAck::new("ACCESS_CANCEL"))
            }
            CancelBehavior::Deny(raw) => Ok(ProviderAck::new(raw)),
            CancelBehavior::LostAfterCancel => {
                self.set_status(id, RemoteStatus::Cancelled);
                Err(ProviderError::Transport("timed out".to_string()))
            }
        }
    }

    async fn request_resend(&self, _id: &str) -> Result<ProviderAck, ProviderError> {
        self.resend_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderAck::new("ACCESS_RETRY_GET"))
    }

    async fn finish(&self, _id: &str) -> Result<ProviderAck, ProviderError> {
        self.finish_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ProviderAck::new("ACCESS_ACTIVATION"))
    }

    async fn get_balance(&self) -> Result<f64, ProviderError> {
        Ok(42.5)
    }
}

// --------------------------------------------------------------------------------
// Sink
// --------------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LifecycleNotification>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<LifecycleNotification> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: LifecycleNotification) {
        self.events.lock().unwrap().push(event);
    }
}

// --------------------------------------------------------------------------------
// Armado
// --------------------------------------------------------------------------------

pub struct Harness {
    pub scheduler: LifecycleScheduler,
    pub provider: Arc<FakeProvider>,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
    pub clock: Arc<TokioClock>,
}

impl Harness {
    /// Debe construirse dentro de un runtime de tokio (pausado).
    pub fn new() -> Self {
        let provider = Arc::new(FakeProvider::new());
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let clock = Arc::new(TokioClock::new());
        let scheduler = LifecycleScheduler::new(
            provider.clone(),
            store.clone(),
            sink.clone(),
            clock.clone(),
            LifecycleConfig::default(),
        );
        Harness {
            scheduler,
            provider,
            store,
            sink,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Una activación persistida y no terminal que dejó un proceso anterior.
    pub async fn seed(&self, id: &str, status: ActivationStatus, expires_in: chrono::Duration) -> Activation {
        let now = self.now();
        let expires_at = now + expires_in;
        let activation = Activation {
            id: id.to_string(),
            phone_number: format!("1555{id}"),
            service: "tg".to_string(),
            country: "12".to_string(),
            operator: None,
            status,
            cost: Some(0.1),
            created_at: expires_at - LifecycleConfig::default().lease_delta(),
            expires_at,
            released_at: None,
        };
        self.store.save_activation(&activation).await.unwrap();
        activation
    }
}

pub fn query() -> NumberQuery {
    NumberQuery {
        service: "tg".to_string(),
        country: "12".to_string(),
        ..NumberQuery::default()
    }
}

pub async fn memory_sqlite_store() -> SqliteStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("sqlite en memoria");
    let store = SqliteStore::new(pool);
    store.run_migrations().await.expect("migraciones");
    store
}
