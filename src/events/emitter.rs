use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{EventKind, QueueEvent};
use crate::queue::GuildQueue;

pub type Listener = Arc<dyn Fn(&GuildQueue, &QueueEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Typed listener registry shared by every queue of a player.
///
/// Kinds listed as required get a warning whenever they fire with nobody
/// listening, since that usually means errors are being lost.
pub struct EventEmitter {
    listeners: RwLock<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
    required: Vec<EventKind>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(vec![EventKind::Error, EventKind::PlayerError])
    }
}

impl EventEmitter {
    pub fn new(required: Vec<EventKind>) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            required,
        }
    }

    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&GuildQueue, &QueueEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        for list in listeners.values_mut() {
            if let Some(idx) = list.iter().position(|(lid, _)| *lid == id) {
                list.remove(idx);
                return true;
            }
        }
        false
    }

    pub fn remove_all(&self) {
        self.listeners.write().clear();
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.listener_count(kind) > 0
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// Calls every listener of the event's kind. Returns `false` when there
    /// were none.
    pub fn emit(&self, queue: &GuildQueue, event: QueueEvent) -> bool {
        let kind = event.kind();
        if let QueueEvent::Debug(msg) = &event {
            debug!("[{}] {}", queue.guild_id(), msg);
        }

        // Snapshot so listeners may register or remove listeners themselves.
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .get(&kind)
            .map(|list| list.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        if listeners.is_empty() {
            if self.required.contains(&kind) {
                warn!(
                    "[{}] No '{}' listener registered, dropping {:?}",
                    queue.guild_id(),
                    kind,
                    event
                );
            }
            return false;
        }

        for listener in listeners {
            listener(queue, &event);
        }
        true
    }
}
