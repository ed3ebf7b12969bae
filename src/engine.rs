//! Session engine: owns the registry, router and control channel
//!
//! There is no global state. An application creates one engine at start-up
//! and shuts it down on exit.

use std::sync::{Arc, OnceLock};

use tokio::sync::broadcast;

use crate::control::{ControlChannelServer, ControlEndpoint, ControlHandler, ControlMessage, DiagnosticLog};
use crate::error::Result;
use crate::pty::{PtyBackend, ShutdownOutcome, default_backend};
use crate::registry::{CreateSessionRequest, OrphanProcess, SessionRegistry, SessionSnapshot, StateStore};
use crate::router::EventRouter;
use crate::session::{Session, SessionEvent};
use crate::types::identifiers::SessionId;
use crate::types::options::EngineOptions;

/// Running session engine
#[derive(Debug)]
pub struct SessionEngine {
    registry: Arc<SessionRegistry>,
    router: EventRouter,
    diagnostics: Arc<DiagnosticLog>,
    server: ControlChannelServer,
    state_store: Option<StateStore>,
}

impl SessionEngine {
    /// Start with the platform pseudo-terminal backend
    ///
    /// # Errors
    /// Returns `Transport` if the control endpoint cannot be bound
    pub async fn start(options: EngineOptions) -> Result<Self> {
        Self::start_with_backend(options, default_backend()).await
    }

    /// Start with an explicit backend
    ///
    /// The control channel is bound first so that hosted processes are
    /// always told the endpoint actually in use (e.g. the port picked for
    /// `tcp://127.0.0.1:0`).
    ///
    /// # Errors
    /// Returns `Transport` if the control endpoint cannot be bound
    pub async fn start_with_backend(
        mut options: EngineOptions,
        backend: Arc<dyn PtyBackend>,
    ) -> Result<Self> {
        let diagnostics = Arc::new(DiagnosticLog::new(options.diagnostic_log_capacity));

        // Messages arriving before the router exists have no session to reach
        let slot: Arc<OnceLock<EventRouter>> = Arc::new(OnceLock::new());
        let handler = {
            let slot = Arc::clone(&slot);
            move |message: ControlMessage| {
                if let Some(router) = slot.get() {
                    router.handle(message);
                }
            }
        };
        let server = ControlChannelServer::bind(
            &options.endpoint,
            Arc::new(handler),
            Arc::clone(&diagnostics),
            options.read_timeout,
        )
        .await?;
        options.endpoint = server.endpoint().clone();

        let state_store = options.state_file.clone().map(StateStore::new);
        let registry = Arc::new(SessionRegistry::new(options, backend));
        let router = EventRouter::new(Arc::clone(&registry));
        let _ = slot.set(router.clone());

        Ok(Self {
            registry,
            router,
            diagnostics,
            server,
            state_store,
        })
    }

    /// Session registry
    #[must_use]
    pub const fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Event router
    #[must_use]
    pub const fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Raw control messages received most recently
    #[must_use]
    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    /// Endpoint the control channel is bound to
    #[must_use]
    pub const fn endpoint(&self) -> &ControlEndpoint {
        self.server.endpoint()
    }

    /// Receive session events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.registry.events().subscribe()
    }

    /// Register a session event callback
    pub fn on_event<F>(&self, callback: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.registry.events().on_event(callback);
    }

    /// Create a session
    ///
    /// # Errors
    /// Returns a spawn error if the session cannot be started
    pub async fn create_session(&self, request: CreateSessionRequest) -> Result<Arc<Session>> {
        self.registry.create(request).await
    }

    /// Kill a session; `None` if it did not exist
    pub async fn kill_session(&self, id: SessionId) -> Option<ShutdownOutcome> {
        self.registry.kill(id).await
    }

    /// Untracked hosted-executable processes
    #[must_use]
    pub fn scan_for_orphans(&self) -> Vec<OrphanProcess> {
        self.registry.scan_for_orphans()
    }

    /// Stored sessions, empty if persistence is off or the file is unreadable
    #[must_use]
    pub fn load_persisted(&self) -> Vec<SessionSnapshot> {
        let Some(store) = &self.state_store else {
            return Vec::new();
        };
        store.load().unwrap_or_else(|e| {
            log::warn!("Ignoring persisted sessions: {e}");
            Vec::new()
        })
    }

    /// Start fresh sessions for everything stored
    pub async fn restore_persisted(&self) -> Vec<Arc<Session>> {
        let snapshots = self.load_persisted();
        if snapshots.is_empty() {
            return Vec::new();
        }
        log::info!("Restoring {} session(s)", snapshots.len());
        self.registry.restore(snapshots).await
    }

    /// Write the current session list
    ///
    /// # Errors
    /// Returns `Persistence` if the state file cannot be written
    pub fn persist(&self) -> Result<()> {
        match &self.state_store {
            Some(store) => store.save(&self.registry.snapshot()),
            None => Ok(()),
        }
    }

    /// Stop listening, persist the session list, then kill every session
    pub async fn shutdown(&self) {
        self.server.stop().await;
        if let Err(e) = self.persist() {
            log::error!("Failed to persist sessions: {e}");
        }
        self.registry.shutdown().await;
    }
}
