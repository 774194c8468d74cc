//! services/lifecycle.rs
//! Transiciones del ciclo de vida de una activación: `(estado, evento) -> (nuevo estado, efectos)`.
//! Sin I/O ni timers; el scheduler ejecuta los efectos en orden.

use crate::models::activation_model::ActivationStatus;
use crate::models::event_model::ReleaseReason;
use crate::services::registry::EntryGuards;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleState {
    pub status: ActivationStatus,
    pub guards: EntryGuards,
}

impl LifecycleState {
    pub fn new(status: ActivationStatus, guards: EntryGuards) -> Self {
        LifecycleState { status, guards }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    PollWaiting,
    PollReceived { message: Option<String> },
    PollCancelled,
    /// El proveedor confirmó la cancelación pedida por el timer de release.
    ReleaseConfirmed,
    /// El proveedor confirmó la cancelación pedida por el usuario.
    ManualReleaseConfirmed,
    LeaseExpired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Guarda el código y marca el guard del primer mensaje.
    SaveMessage(String),
    /// Escribe el nuevo estado; `stamp_released` fija `released_at = now`.
    Persist {
        status: ActivationStatus,
        stamp_released: bool,
    },
    DisarmRelease,
    NotifySmsReceived(String),
    ScheduleResend,
    NotifyReleased(ReleaseReason),
    FinishWithProvider,
    /// Detiene el polling y todos los timers del id. Siempre es el último efecto.
    Teardown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: ActivationStatus,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(status: ActivationStatus) -> Self {
        Transition {
            next: status,
            effects: Vec::new(),
        }
    }

    fn to(next: ActivationStatus, effects: Vec<Effect>) -> Self {
        Transition { next, effects }
    }

    pub fn is_noop(&self) -> bool {
        self.effects.is_empty()
    }
}

pub fn transition(state: &LifecycleState, event: &LifecycleEvent) -> Transition {
    let status = state.status;

    // Terminal es terminal: ningún evento la reabre
    if status.is_terminal() {
        return Transition::stay(status);
    }

    match event {
        LifecycleEvent::PollWaiting => Transition::stay(status),

        LifecycleEvent::PollReceived { message } => match message {
            // El estado se escribe antes que el mensaje: si falla, el siguiente tick lo reintenta
            Some(text) if !state.guards.first_message_saved => {
                let mut effects = Vec::new();
                if status != ActivationStatus::Received {
                    effects.push(Effect::Persist {
                        status: ActivationStatus::Received,
                        stamp_released: false,
                    });
                }
                effects.push(Effect::SaveMessage(text.clone()));
                effects.push(Effect::DisarmRelease);
                effects.push(Effect::NotifySmsReceived(text.clone()));
                Transition::to(ActivationStatus::Received, effects)
            }
            // Reenvío solo en los ticks posteriores a la primera recepción
            _ if state.guards.first_message_saved && !state.guards.resend_requested => {
                Transition::to(status, vec![Effect::ScheduleResend])
            }
            _ => Transition::stay(status),
        },

        LifecycleEvent::PollCancelled => Transition::to(
            ActivationStatus::Cancelled,
            vec![
                Effect::Persist {
                    status: ActivationStatus::Cancelled,
                    stamp_released: true,
                },
                Effect::Teardown,
            ],
        ),

        // Una recepción real nunca se deshace por el auto-release
        LifecycleEvent::ReleaseConfirmed if status == ActivationStatus::Received => {
            Transition::stay(status)
        }

        LifecycleEvent::ReleaseConfirmed => Transition::to(
            ActivationStatus::Released,
            vec![
                Effect::Persist {
                    status: ActivationStatus::Released,
                    stamp_released: true,
                },
                Effect::NotifyReleased(ReleaseReason::AutoRelease),
                Effect::Teardown,
            ],
        ),

        LifecycleEvent::ManualReleaseConfirmed => Transition::to(
            ActivationStatus::Released,
            vec![
                Effect::Persist {
                    status: ActivationStatus::Released,
                    stamp_released: true,
                },
                Effect::NotifyReleased(ReleaseReason::Manual),
                Effect::Teardown,
            ],
        ),

        LifecycleEvent::LeaseExpired => {
            let mut effects = vec![Effect::Persist {
                status: ActivationStatus::Completed,
                stamp_released: true,
            }];
            if status == ActivationStatus::Received {
                effects.push(Effect::FinishWithProvider);
            }
            effects.push(Effect::Teardown);
            Transition::to(ActivationStatus::Completed, effects)
        }
    }
}
