//! services/scheduler_service.rs
//! Scheduler del ciclo de vida: renta números, los sondea, arma los timers de
//! auto-release y de expiración, y recupera las activaciones tras un reinicio.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::lifecycle_config::LifecycleConfig;
use crate::errors::{ProviderError, SchedulerError};
use crate::models::activation_model::{Activation, ActivationStatus};
use crate::models::event_model::LifecycleNotification;
use crate::models::provider_model::{NumberQuery, ProviderAck, RemoteStatus};
use crate::services::clock::{delay_until, Clock};
use crate::services::event_sink::EventSink;
use crate::services::lifecycle::{self, Effect, LifecycleEvent, LifecycleState, Transition};
use crate::services::provider_service::ProviderClient;
use crate::services::registry::ActivationRegistry;
use crate::services::store_service::ActivationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Watching,
    AlreadyWatched,
    /// La renta ya había terminado; la activación se completó en el acto.
    Completed,
    Terminal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub resumed: usize,
    pub completed: usize,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct LifecycleScheduler {
    provider: Arc<dyn ProviderClient>,
    store: Arc<dyn ActivationStore>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    registry: Arc<ActivationRegistry>,
    config: Arc<LifecycleConfig>,
}

impl LifecycleScheduler {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        store: Arc<dyn ActivationStore>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        config: LifecycleConfig,
    ) -> Self {
        LifecycleScheduler {
            provider,
            store,
            sink,
            clock,
            registry: Arc::new(ActivationRegistry::new()),
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &ActivationRegistry {
        &self.registry
    }

    // ========================================================================
    // Operaciones públicas
    // ========================================================================

    /// Renta un número, lo persiste y empieza a vigilarlo.
    pub async fn request_number(&self, query: NumberQuery) -> Result<Activation, SchedulerError> {
        let grant = self.provider.request_number(&query).await?;

        let created_at = self.clock.now();
        let operator = grant
            .operator
            .or_else(|| (query.operators.len() == 1).then(|| query.operators[0].clone()));
        let activation = Activation {
            id: grant.id,
            phone_number: grant.phone_number,
            service: query.service,
            country: query.country,
            operator,
            status: ActivationStatus::Active,
            cost: grant.cost,
            created_at,
            expires_at: created_at + self.config.lease_delta(),
            released_at: None,
        };

        if let Err(e) = self.store.save_activation(&activation).await {
            // Número rentado pero sin registro local: se devuelve al proveedor
            log::error!(
                "No se pudo guardar la activación id={}: {:?}; se cancela con el proveedor",
                activation.id,
                e
            );
            if let Err(cancel_err) = self.provider.cancel(&activation.id).await {
                log::warn!(
                    "Falló la cancelación de la activación no guardada id={}: {}",
                    activation.id,
                    cancel_err
                );
            }
            return Err(e.into());
        }

        log::info!(
            "Rentado {} para service={} country={} id={} expires_at={}",
            activation.phone_number,
            activation.service,
            activation.country,
            activation.id,
            activation.expires_at
        );

        self.watch(&activation).await;
        Ok(activation)
    }

    /// Arranca el polling y ambos timers de `activation`. Llamarlo otra vez
    /// para un id ya vigilado no hace nada.
    pub async fn watch(&self, activation: &Activation) -> WatchOutcome {
        let id = activation.id.as_str();

        if activation.status.is_terminal() {
            return WatchOutcome::Terminal;
        }
        if self.registry.contains(id) {
            log::debug!("id={} ya está vigilado", id);
            return WatchOutcome::AlreadyWatched;
        }

        let now = self.clock.now();
        if now >= activation.expires_at {
            log::info!(
                "La renta de id={} terminó en {} sin nadie vigilando; se completa",
                id,
                activation.expires_at
            );
            self.complete(id).await;
            return WatchOutcome::Completed;
        }

        self.start_polling(id);
        if activation.status == ActivationStatus::Received {
            // El código ya está guardado; no se vuelve a notificar
            self.registry.mark_first_message_saved(id);
        }
        self.arm_release(activation, now);
        self.arm_completion(activation, now);

        WatchOutcome::Watching
    }

    /// Vuelve a vigilar cada activación no terminal con su `expires_at` persistido.
    pub async fn recover(&self) -> Result<RecoveryReport, SchedulerError> {
        let pending = self.store.list_non_terminal_activations().await?;
        let mut report = RecoveryReport::default();

        for activation in &pending {
            match self.watch(activation).await {
                WatchOutcome::Watching => report.resumed += 1,
                WatchOutcome::Completed => report.completed += 1,
                WatchOutcome::AlreadyWatched | WatchOutcome::Terminal => report.skipped += 1,
            }
        }

        log::info!(
            "Recuperación terminada: {} retomadas, {} completadas, {} omitidas",
            report.resumed,
            report.completed,
            report.skipped
        );
        Ok(report)
    }

    /// Release pedido por el usuario. Sin chequeo de recepción: el número
    /// siempre se cancela con el proveedor.
    pub async fn release(&self, id: &str) -> Result<Activation, SchedulerError> {
        let activation = self.load_open(id).await?;

        let confirmed = match self.provider.cancel(id).await {
            Ok(ack) if ack.is_success() => true,
            Ok(ack) => return Err(ProviderError::Logical(ack.raw).into()),
            Err(e) if e.is_transport() => {
                log::warn!(
                    "La cancelación de id={} falló en tránsito ({}); se consulta el estado al proveedor",
                    id,
                    e
                );
                self.confirm_cancelled(
                    id,
                    self.config.manual_confirm_attempts,
                    self.config.manual_confirm_interval,
                )
                .await
            }
            Err(e) => return Err(e.into()),
        };

        if !confirmed {
            log::warn!(
                "ConfirmationTimeout: release manual de id={} sin confirmar; el estado sigue {}",
                id,
                activation.status
            );
            return Err(SchedulerError::ConfirmationTimeout(id.to_string()));
        }

        if !self.dispatch(id, LifecycleEvent::ManualReleaseConfirmed).await? {
            // Otro camino la cerró primero; igual se desmonta todo
            self.registry.teardown(id);
        }

        self.store
            .get_activation(id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))
    }

    /// Pide al proveedor otro código para una activación viva.
    pub async fn request_resend(&self, id: &str) -> Result<ProviderAck, SchedulerError> {
        self.load_open(id).await?;
        let ack = self.provider.request_resend(id).await?;
        if !ack.is_success() {
            return Err(ProviderError::Logical(ack.raw).into());
        }
        log::info!("Reenvío pedido para id={}", id);
        Ok(ack)
    }

    /// Aborta todos los polling y timers. El estado persistido queda igual.
    pub fn shutdown(&self) {
        let count = self.registry.shutdown();
        log::info!("Scheduler detenido; {} activación(es) quedan para recuperar", count);
    }

    async fn load_open(&self, id: &str) -> Result<Activation, SchedulerError> {
        let activation = self
            .store
            .get_activation(id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;
        if activation.status.is_terminal() {
            return Err(SchedulerError::AlreadyTerminal {
                id: id.to_string(),
                status: activation.status,
            });
        }
        Ok(activation)
    }

    // ========================================================================
    // Polling
    // ========================================================================

    fn start_polling(&self, id: &str) -> bool {
        let scheduler = self.clone();
        let task_id = id.to_string();
        let started = self.registry.start_polling(id, move || {
            tokio::spawn(async move { scheduler.poll_loop(task_id).await })
        });
        if started {
            log::debug!("Sondeando id={} cada {:?}", id, self.config.poll_interval);
        }
        started
    }

    async fn poll_loop(self, id: String) {
        let period = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Termina cuando el registry aborta la tarea
        loop {
            ticker.tick().await;
            self.poll_once(&id).await;
        }
    }

    pub(crate) async fn poll_once(&self, id: &str) {
        let remote = match self.provider.get_status(id).await {
            Ok(remote) => remote,
            Err(e) => {
                log::warn!("Falló el sondeo de id={}: {}; se reintenta en el siguiente tick", id, e);
                return;
            }
        };

        let event = match remote {
            RemoteStatus::Waiting => LifecycleEvent::PollWaiting,
            RemoteStatus::Received(message) => LifecycleEvent::PollReceived { message },
            RemoteStatus::Cancelled => LifecycleEvent::PollCancelled,
            RemoteStatus::Unknown(raw) => {
                log::debug!("Estado desconocido para id={}: {}", id, raw);
                return;
            }
        };

        if let Err(e) = self.dispatch(id, event).await {
            log::error!("No se pudo aplicar el tick de id={}: {}", id, e);
        }
    }

    fn schedule_resend(&self, id: &str) {
        let scheduler = self.clone();
        let task_id = id.to_string();
        let delay = self.config.resend_delay;

        let armed = self.registry.arm_resend(id, move || {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                match scheduler.provider.request_resend(&task_id).await {
                    Ok(ack) if ack.is_success() => {
                        log::info!("Reenvío aceptado para id={}", task_id)
                    }
                    Ok(ack) => log::warn!("El reenvío de id={} respondió {}", task_id, ack.raw),
                    Err(e) => log::warn!("Falló el reenvío de id={}: {}", task_id, e),
                }
            })
        });
        if armed {
            log::debug!("Reenvío de id={} programado en {:?}", id, delay);
        }
    }

    // ========================================================================
    // Auto-release
    // ========================================================================

    fn arm_release(&self, activation: &Activation, now: DateTime<Utc>) -> bool {
        let release_at = activation.release_at(self.config.release_lead_delta());
        if release_at <= now {
            log::info!(
                "El punto de release de id={} ({}) ya pasó; el número se mantiene hasta expirar",
                activation.id,
                release_at
            );
            return false;
        }

        let delay = delay_until(now, release_at);
        let scheduler = self.clone();
        let id = activation.id.clone();
        self.registry.arm_release(&activation.id, release_at, move || {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if scheduler.registry.take_release(&id) {
                    scheduler.fire_release(&id).await;
                }
            })
        })
    }

    /// Cuerpo del timer de release. Antes de cancelar se revisan los mensajes
    /// locales y un estado remoto recién consultado.
    pub(crate) async fn fire_release(&self, id: &str) {
        let activation = match self.store.get_activation(id).await {
            Ok(Some(activation)) => activation,
            Ok(None) => {
                log::warn!("Timer de release disparado para id={} desconocido", id);
                return;
            }
            Err(e) => {
                log::error!("El timer de release de id={} no pudo cargarla: {:?}", id, e);
                return;
            }
        };
        if activation.status.is_terminal() || activation.status == ActivationStatus::Received {
            log::debug!("Timer de release de id={} omitido, estado {}", id, activation.status);
            return;
        }

        match self.store.list_messages(id).await {
            Ok(messages) if !messages.is_empty() => {
                log::info!("Release de id={} omitido: hay un mensaje guardado", id);
                return;
            }
            Ok(_) => {}
            Err(e) => {
                log::error!(
                    "Release de id={} omitido: no se pudieron leer los mensajes locales: {:?}",
                    id,
                    e
                );
                return;
            }
        }

        match self.provider.get_status(id).await {
            Ok(RemoteStatus::Received(_)) => {
                log::info!("Release de id={} omitido: el proveedor reporta un código", id);
                return;
            }
            Ok(_) => {}
            Err(e) => log::warn!(
                "Falló el chequeo remoto antes del release de id={}: {}; se usan los mensajes locales",
                id,
                e
            ),
        }

        let confirmed = self
            .cancel_with_confirmation(
                id,
                self.config.release_confirm_attempts,
                self.config.release_confirm_interval,
            )
            .await;

        if !confirmed {
            log::warn!(
                "ConfirmationTimeout: auto-release de id={} sin confirmar; queda {} hasta expirar en {}",
                id,
                activation.status,
                activation.expires_at
            );
            return;
        }

        match self.dispatch(id, LifecycleEvent::ReleaseConfirmed).await {
            Ok(true) => log::info!("Liberado {} (id={})", activation.phone_number, id),
            Ok(false) => log::debug!("id={} se cerró antes de aplicar su release", id),
            Err(e) => log::error!("No se pudo guardar el release de id={}: {}", id, e),
        }
    }

    async fn cancel_with_confirmation(&self, id: &str, attempts: u32, interval: Duration) -> bool {
        match self.provider.cancel(id).await {
            Ok(ack) if ack.is_success() => return true,
            Ok(ack) => log::info!("La cancelación de id={} respondió {}", id, ack.raw),
            Err(e) => log::warn!("Falló la cancelación de id={}: {}", id, e),
        }
        self.confirm_cancelled(id, attempts, interval).await
    }

    /// Consulta el estado hasta `attempts` veces, separadas por `interval`;
    /// `cancelled` cuenta como confirmación.
    async fn confirm_cancelled(&self, id: &str, attempts: u32, interval: Duration) -> bool {
        for attempt in 1..=attempts {
            tokio::time::sleep(interval).await;
            match self.provider.get_status(id).await {
                Ok(RemoteStatus::Cancelled) => return true,
                Ok(other) => log::debug!(
                    "Chequeo de cancelación {}/{} de id={}: {:?}",
                    attempt,
                    attempts,
                    id,
                    other
                ),
                Err(e) => log::debug!("Chequeo de cancelación {}/{} de id={}: {}", attempt, attempts, id, e),
            }
        }
        false
    }

    // ========================================================================
    // Expiración
    // ========================================================================

    fn arm_completion(&self, activation: &Activation, now: DateTime<Utc>) -> bool {
        let deadline = activation.expires_at;
        let delay = delay_until(now, deadline);
        let scheduler = self.clone();
        let id = activation.id.clone();
        self.registry.arm_completion(&activation.id, deadline, move || {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if scheduler.registry.take_completion(&id) {
                    scheduler.complete(&id).await;
                }
            })
        })
    }

    async fn complete(&self, id: &str) {
        match self.dispatch(id, LifecycleEvent::LeaseExpired).await {
            Ok(true) => log::info!("Renta de id={} completada", id),
            Ok(false) => log::debug!("id={} ya estaba cerrada al expirar", id),
            Err(e) => {
                // Sin timer de expiración no hay nada más que esperar; recovery la cerrará
                log::error!("Falló completar id={}: {}; se detienen sus tareas", id, e);
                self.registry.teardown(id);
            }
        }
    }

    // ========================================================================
    // Transiciones
    // ========================================================================

    /// Carga la activación, corre la función de transición y aplica sus
    /// efectos. `Ok(false)` significa que no se escribió nada: el evento no
    /// cambia nada o la activación es (o acaba de volverse) terminal.
    async fn dispatch(&self, id: &str, event: LifecycleEvent) -> Result<bool, SchedulerError> {
        let activation = self
            .store
            .get_activation(id)
            .await?
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))?;

        let guards = self.registry.guards(id).unwrap_or_default();
        let state = LifecycleState::new(activation.status, guards);
        let transition = lifecycle::transition(&state, &event);

        if transition.is_noop() {
            return Ok(false);
        }
        log::debug!(
            "id={} {:?}: {} -> {} {:?}",
            id,
            event,
            activation.status,
            transition.next,
            transition.effects
        );
        self.apply(&activation, transition).await
    }

    async fn apply(&self, activation: &Activation, transition: Transition) -> Result<bool, SchedulerError> {
        let id = activation.id.as_str();
        let now = self.clock.now();

        for effect in transition.effects {
            match effect {
                Effect::SaveMessage(text) => {
                    self.store.save_message(id, &text, now).await?;
                    self.registry.mark_first_message_saved(id);
                    log::info!("Código recibido para id={}", id);
                }
                Effect::Persist {
                    status,
                    stamp_released,
                } => {
                    let released_at = stamp_released.then_some(now);
                    if !self.store.update_status(id, status, released_at).await? {
                        return Ok(false);
                    }
                    log::info!("Activación id={}: {} -> {}", id, activation.status, status);
                }
                Effect::DisarmRelease => {
                    if self.registry.disarm_release(id) {
                        log::debug!("Timer de release de id={} desarmado", id);
                    }
                }
                Effect::NotifySmsReceived(message) => {
                    self.sink.emit(LifecycleNotification::SmsReceived {
                        id: id.to_string(),
                        phone_number: activation.phone_number.clone(),
                        message,
                        received_at: now,
                    });
                }
                Effect::ScheduleResend => self.schedule_resend(id),
                Effect::NotifyReleased(reason) => {
                    self.sink.emit(LifecycleNotification::NumberReleased {
                        id: id.to_string(),
                        reason,
                    });
                }
                Effect::FinishWithProvider => match self.provider.finish(id).await {
                    Ok(ack) if ack.is_success() => log::debug!("El proveedor cerró id={}", id),
                    Ok(ack) => log::warn!("El cierre de id={} respondió {}", id, ack.raw),
                    Err(e) => log::warn!("Falló el cierre de id={}: {}", id, e),
                },
                Effect::Teardown => {
                    self.registry.teardown(id);
                }
            }
        }

        Ok(true)
    }
}
