//! services/registry.rs
//! Registro en memoria de las activaciones vigiladas: una entrada por id con
//! sus handles de tareas y sus guards de una sola vez.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

struct ArmedTimer {
    handle: JoinHandle<()>,
    deadline: DateTime<Utc>,
}

#[derive(Default)]
struct RegistryEntry {
    poll: Option<JoinHandle<()>>,
    release: Option<ArmedTimer>,
    completion: Option<ArmedTimer>,
    resend: Option<JoinHandle<()>>,
    release_armed: bool,
    completion_armed: bool,
    first_message_saved: bool,
    resend_requested: bool,
}

impl RegistryEntry {
    fn is_idle(&self) -> bool {
        self.poll.is_none() && self.release.is_none() && self.completion.is_none()
    }

    fn abort_all(self) {
        if let Some(handle) = self.poll {
            handle.abort();
        }
        if let Some(timer) = self.release {
            timer.handle.abort();
        }
        if let Some(timer) = self.completion {
            timer.handle.abort();
        }
        if let Some(handle) = self.resend {
            handle.abort();
        }
    }
}

/// Guards de una sola vez de una entrada.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntryGuards {
    pub first_message_saved: bool,
    pub resend_requested: bool,
}

/// Vista de solo lectura de una entrada, para inspeccionar lo programado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySnapshot {
    pub polling: bool,
    pub release_deadline: Option<DateTime<Utc>>,
    pub completion_deadline: Option<DateTime<Utc>>,
    pub resend_pending: bool,
    pub guards: EntryGuards,
}

/// Un solo mutex sobre todo el mapa. Las secciones críticas nunca hacen await,
/// así que un id no espera a otro más allá de un lookup.
#[derive(Default)]
pub struct ActivationRegistry {
    entries: Mutex<HashMap<String, RegistryEntry>>,
}

impl ActivationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RegistryEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self, id: &str) -> Option<EntrySnapshot> {
        self.lock().get(id).map(|entry| EntrySnapshot {
            polling: entry.poll.is_some(),
            release_deadline: entry.release.as_ref().map(|t| t.deadline),
            completion_deadline: entry.completion.as_ref().map(|t| t.deadline),
            resend_pending: entry.resend.as_ref().is_some_and(|h| !h.is_finished()),
            guards: EntryGuards {
                first_message_saved: entry.first_message_saved,
                resend_requested: entry.resend_requested,
            },
        })
    }

    pub fn guards(&self, id: &str) -> Option<EntryGuards> {
        self.lock().get(id).map(|entry| EntryGuards {
            first_message_saved: entry.first_message_saved,
            resend_requested: entry.resend_requested,
        })
    }

    /// Arranca la tarea de polling si el id no tiene una. `spawn` corre bajo el
    /// lock: la tarea no ve la entrada antes de que se guarde su handle.
    pub fn start_polling<F>(&self, id: &str, spawn: F) -> bool
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        let mut entries = self.lock();
        let entry = entries.entry(id.to_string()).or_default();
        if entry.poll.is_some() {
            return false;
        }
        entry.poll = Some(spawn());
        true
    }

    /// Arma el timer de release una vez por vida de la entrada.
    pub fn arm_release<F>(&self, id: &str, deadline: DateTime<Utc>, spawn: F) -> bool
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        let mut entries = self.lock();
        let entry = entries.entry(id.to_string()).or_default();
        if entry.release_armed {
            return false;
        }
        entry.release_armed = true;
        entry.release = Some(ArmedTimer {
            handle: spawn(),
            deadline,
        });
        true
    }

    /// Arma el timer de expiración una vez por vida de la entrada.
    pub fn arm_completion<F>(&self, id: &str, deadline: DateTime<Utc>, spawn: F) -> bool
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        let mut entries = self.lock();
        let entry = entries.entry(id.to_string()).or_default();
        if entry.completion_armed {
            return false;
        }
        entry.completion_armed = true;
        entry.completion = Some(ArmedTimer {
            handle: spawn(),
            deadline,
        });
        true
    }

    /// Programa el reenvío diferido como mucho una vez por id. Los ids no
    /// vigilados no reciben nada.
    pub fn arm_resend<F>(&self, id: &str, spawn: F) -> bool
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(id) else {
            return false;
        };
        if entry.resend_requested {
            return false;
        }
        entry.resend_requested = true;
        entry.resend = Some(spawn());
        true
    }

    /// Devuelve `true` solo en la llamada que cambia el guard.
    pub fn mark_first_message_saved(&self, id: &str) -> bool {
        let mut entries = self.lock();
        match entries.get_mut(id) {
            Some(entry) if !entry.first_message_saved => {
                entry.first_message_saved = true;
                true
            }
            _ => false,
        }
    }

    /// Cancela un timer de release pendiente. No hace nada si ya disparó o se limpió.
    pub fn disarm_release(&self, id: &str) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(id) else {
            return false;
        };
        let Some(timer) = entry.release.take() else {
            return false;
        };
        timer.handle.abort();
        Self::prune(&mut entries, id);
        true
    }

    /// Lo llama la tarea de release al despertar. `false` significa que se
    /// desarmó mientras tanto y no debe correr.
    pub fn take_release(&self, id: &str) -> bool {
        let mut entries = self.lock();
        let taken = entries
            .get_mut(id)
            .and_then(|entry| entry.release.take())
            .is_some();
        if taken {
            Self::prune(&mut entries, id);
        }
        taken
    }

    /// Igual que [`take_release`](Self::take_release) para el timer de expiración.
    pub fn take_completion(&self, id: &str) -> bool {
        let mut entries = self.lock();
        let taken = entries
            .get_mut(id)
            .and_then(|entry| entry.completion.take())
            .is_some();
        if taken {
            Self::prune(&mut entries, id);
        }
        taken
    }

    /// Quita la entrada y aborta todas sus tareas. Idempotente.
    ///
    /// Una tarea que desmonta su propio id también se aborta; después no debe
    /// esperar nada importante.
    pub fn teardown(&self, id: &str) -> bool {
        let removed = self.lock().remove(id);
        match removed {
            Some(entry) => {
                entry.abort_all();
                true
            }
            None => false,
        }
    }

    /// Aborta todo; el estado queda persistido para la próxima recuperación.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<RegistryEntry> = self.lock().drain().map(|(_, entry)| entry).collect();
        let count = drained.len();
        for entry in drained {
            entry.abort_all();
        }
        count
    }

    fn prune(entries: &mut HashMap<String, RegistryEntry>, id: &str) {
        if entries.get(id).is_some_and(RegistryEntry::is_idle) {
            if let Some(entry) = entries.remove(id) {
                entry.abort_all();
            }
        }
    }
}
