//! Session notifications
//!
//! Events are published on a tokio broadcast channel and to plain callbacks.
//! Callbacks run on whichever thread raised the event; moving work onto a UI
//! thread is the embedder's job.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::activity::ActivityState;
use crate::types::identifiers::{CorrelationId, SessionId};

const BROADCAST_CAPACITY: usize = 256;

/// Something observers may want to know about a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Activity state changed from `old` to `new`
    ActivityStateChanged {
        /// Session
        session_id: SessionId,
        /// Previous state
        old: ActivityState,
        /// Current state
        new: ActivityState,
    },
    /// A session was bound to the hosted CLI's session id
    Correlated {
        /// Session
        session_id: SessionId,
        /// External id now bound
        correlation_id: CorrelationId,
    },
    /// The hosted process exited
    Exited {
        /// Session
        session_id: SessionId,
        /// Exit code, -1 if unknown
        exit_code: i32,
    },
}

impl SessionEvent {
    /// Session the event is about
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        match self {
            Self::ActivityStateChanged { session_id, .. }
            | Self::Correlated { session_id, .. }
            | Self::Exited { session_id, .. } => *session_id,
        }
    }
}

type Callback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Fan-out point for [`SessionEvent`]s
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
    callbacks: RwLock<Vec<Callback>>,
}

impl EventBus {
    /// Create an empty bus
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            sender,
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Receive every event published after this call
    ///
    /// A receiver that falls more than 256 events behind gets `Lagged`.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Register a callback invoked for every event
    pub fn on_event<F>(&self, callback: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.callbacks.write().push(Arc::new(callback));
    }

    /// Publish an event
    ///
    /// Must not be called while holding a session state lock.
    pub fn emit(&self, event: SessionEvent) {
        // Callbacks may register further callbacks; don't hold the lock while calling
        let callbacks: Vec<Callback> = self.callbacks.read().clone();
        for callback in &callbacks {
            callback(&event);
        }
        // No receivers is fine
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .field("callbacks", &self.callbacks.read().len())
            .finish()
    }
}
