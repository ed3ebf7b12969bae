//! Session registry
//!
//! Owns every live [`Session`] and the correlation map. Both maps are shared
//! with the router and the exit monitors. Locks are always taken in the
//! order correlations, then sessions, then a session's own state, and never
//! across an `.await` or an event emission.

pub mod orphans;
pub mod persistence;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::RwLock;

use crate::buffer::CircularByteBuffer;
use crate::error::{DirectorError, Result};
use crate::pty::{ChildProcessHost, PtyBackend, ShutdownOutcome, SpawnCommand, TerminalSize};
use crate::session::{EventBus, Session, SessionEvent, SessionLabels};
use crate::types::activity::ActivityState;
use crate::types::identifiers::{CorrelationId, SessionId};
use crate::types::options::EngineOptions;

pub use orphans::{OrphanProcess, scan_for_orphans};
pub use persistence::{SessionSnapshot, StateStore};

/// Parameters for a new session
#[derive(Debug, Clone, Default)]
pub struct CreateSessionRequest {
    /// Directory the hosted CLI runs in
    pub working_directory: PathBuf,
    /// Arguments appended to the configured defaults
    pub args: Vec<String>,
    /// Display name
    pub custom_name: Option<String>,
    /// Colour
    pub custom_color: Option<String>,
    /// Listing position; next free position when `None`
    pub sort_order: Option<i64>,
}

impl CreateSessionRequest {
    /// Request for `working_directory` with default arguments
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            ..Self::default()
        }
    }

    /// Add arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the display name
    #[must_use]
    pub fn custom_name(mut self, name: impl Into<String>) -> Self {
        self.custom_name = Some(name.into());
        self
    }

    /// Set the colour
    #[must_use]
    pub fn custom_color(mut self, color: impl Into<String>) -> Self {
        self.custom_color = Some(color.into());
        self
    }

    /// Set the listing position
    #[must_use]
    pub const fn sort_order(mut self, order: i64) -> Self {
        self.sort_order = Some(order);
        self
    }
}

/// Sessions eligible for first-contact correlation in one directory
#[derive(Debug, Clone)]
pub enum CandidateMatch {
    /// None
    None,
    /// Exactly one
    One(Arc<Session>),
    /// This many; too many to pick from
    Many(usize),
}

/// Result of a first-contact correlation attempt
#[derive(Debug, Clone)]
pub enum FirstContact {
    /// The id was bound concurrently; route to that session
    AlreadyBound(Arc<Session>),
    /// The id is now bound to this session
    Bound(Arc<Session>),
    /// Nothing was bound
    Unmatched(CandidateMatch),
}

/// Registry of live sessions
pub struct SessionRegistry {
    options: EngineOptions,
    backend: Arc<dyn PtyBackend>,
    events: Arc<EventBus>,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    correlations: RwLock<HashMap<CorrelationId, SessionId>>,
    next_sort_order: AtomicI64,
}

impl SessionRegistry {
    /// Empty registry spawning through `backend`
    #[must_use]
    pub fn new(options: EngineOptions, backend: Arc<dyn PtyBackend>) -> Self {
        Self {
            options,
            backend,
            events: Arc::new(EventBus::new()),
            sessions: RwLock::new(HashMap::new()),
            correlations: RwLock::new(HashMap::new()),
            next_sort_order: AtomicI64::new(0),
        }
    }

    /// Options sessions are created with
    #[must_use]
    pub const fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Event bus shared by every session
    #[must_use]
    pub const fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Spawn and register a session
    ///
    /// The session is fully registered, in `Starting`, before this returns.
    ///
    /// # Errors
    /// Returns `WorkingDirectoryNotFound`, `ExecutableNotFound` or `Spawn`
    pub async fn create(&self, request: CreateSessionRequest) -> Result<Arc<Session>> {
        let working_directory = std::fs::canonicalize(&request.working_directory)
            .ok()
            .filter(|path| path.is_dir())
            .ok_or_else(|| DirectorError::working_directory_not_found(&request.working_directory))?;

        let mut args = self.options.default_args.clone();
        args.extend(request.args);
        let command = SpawnCommand {
            program: self.options.executable.clone(),
            args,
            working_directory: working_directory.clone(),
            env: self.options.child_env(),
            size: TerminalSize::new(self.options.cols, self.options.rows),
        };

        let buffer = Arc::new(CircularByteBuffer::new(self.options.buffer_capacity));
        let backend = Arc::clone(&self.backend);
        let drain_buffer = Arc::clone(&buffer);
        let host = tokio::task::spawn_blocking(move || {
            ChildProcessHost::spawn(backend.as_ref(), &command, drain_buffer)
        })
        .await
        .map_err(|e| DirectorError::spawn(format!("Spawn task failed: {e}")))??;

        let labels = SessionLabels {
            custom_name: request.custom_name,
            custom_color: request.custom_color,
            sort_order: request.sort_order.unwrap_or_else(|| self.allocate_sort_order()),
        };
        let session = Arc::new(Session::new(
            SessionId::new(),
            working_directory,
            buffer,
            host,
            TerminalSize::new(self.options.cols, self.options.rows),
            self.options.scrollback_lines,
            labels,
            Arc::clone(&self.events),
        ));
        self.sessions.write().insert(session.id(), Arc::clone(&session));

        let monitor = Arc::clone(&session);
        tokio::spawn(async move { monitor.monitor_exit().await });

        log::info!(
            "Created session {} in {} (pid {:?})",
            session.id(),
            session.working_directory().display(),
            session.process_id()
        );
        Ok(session)
    }

    fn allocate_sort_order(&self) -> i64 {
        self.next_sort_order.fetch_add(1, Ordering::Relaxed)
    }

    /// Session by id
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(&id).cloned()
    }

    /// All sessions, by sort order then creation time
    #[must_use]
    pub fn list(&self) -> Vec<Arc<Session>> {
        let mut sessions: Vec<Arc<Session>> = self.sessions.read().values().cloned().collect();
        sessions.sort_by_key(|s| (s.labels().sort_order, s.created_at()));
        sessions
    }

    /// Number of sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// True if there are no sessions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Session bound to `correlation_id`
    #[must_use]
    pub fn find_by_correlation(&self, correlation_id: &CorrelationId) -> Option<Arc<Session>> {
        let correlations = self.correlations.read();
        let id = correlations.get(correlation_id)?;
        self.sessions.read().get(id).cloned()
    }

    /// Uncorrelated sessions in `cwd` (already canonical) that first contact may bind
    #[must_use]
    pub fn awaiting_correlation_in(&self, cwd: &Path) -> CandidateMatch {
        let sessions = self.sessions.read();
        let mut matches = sessions
            .values()
            .filter(|s| s.working_directory() == cwd && s.awaiting_correlation());
        match (matches.next(), matches.count()) {
            (None, _) => CandidateMatch::None,
            (Some(session), 0) => CandidateMatch::One(Arc::clone(session)),
            (Some(_), rest) => CandidateMatch::Many(rest + 1),
        }
    }

    /// Bind `correlation_id` to the unique eligible session in `cwd`
    ///
    /// Lookup and bind happen under the correlation write lock, so two
    /// concurrent first contacts can never claim the same session.
    pub fn correlate_first_contact(&self, correlation_id: &CorrelationId, cwd: &Path) -> FirstContact {
        let result = {
            let mut correlations = self.correlations.write();
            if let Some(session) = correlations
                .get(correlation_id)
                .and_then(|id| self.sessions.read().get(id).cloned())
            {
                return FirstContact::AlreadyBound(session);
            }

            match self.awaiting_correlation_in(cwd) {
                CandidateMatch::One(session) if session.bind_correlation(correlation_id.clone()) => {
                    correlations.insert(correlation_id.clone(), session.id());
                    FirstContact::Bound(session)
                }
                CandidateMatch::One(_) => FirstContact::Unmatched(CandidateMatch::None),
                other => FirstContact::Unmatched(other),
            }
        };

        if let FirstContact::Bound(session) = &result {
            log::info!("Session {} correlated with {correlation_id}", session.id());
            self.events.emit(SessionEvent::Correlated {
                session_id: session.id(),
                correlation_id: correlation_id.clone(),
            });
        }
        result
    }

    /// Explicitly bind `correlation_id` to `session_id`, replacing any previous binding
    ///
    /// # Errors
    /// Returns `SessionNotFound` for an unknown session and `CorrelationConflict`
    /// if the id is bound to a different session
    pub fn relink(&self, session_id: SessionId, correlation_id: CorrelationId) -> Result<()> {
        let session = self
            .get(session_id)
            .ok_or_else(|| DirectorError::session_not_found(session_id.to_string()))?;

        {
            let mut correlations = self.correlations.write();
            match correlations.get(&correlation_id) {
                Some(&bound) if bound == session_id => return Ok(()),
                Some(&bound) => {
                    return Err(DirectorError::correlation_conflict(
                        correlation_id.as_str(),
                        bound.to_string(),
                    ));
                }
                None => {}
            }
            if let Some(previous) = session.replace_correlation(correlation_id.clone()) {
                correlations.remove(&previous);
            }
            correlations.insert(correlation_id.clone(), session_id);
        }

        log::info!("Session {session_id} re-linked to {correlation_id}");
        self.events.emit(SessionEvent::Correlated {
            session_id,
            correlation_id,
        });
        Ok(())
    }

    /// Stop and remove a session; `None` if it was not registered
    ///
    /// Safe to call repeatedly and concurrently.
    pub async fn kill(&self, id: SessionId) -> Option<ShutdownOutcome> {
        let session = self.sessions.write().remove(&id)?;
        if let Some(correlation_id) = session.correlation_id() {
            let mut correlations = self.correlations.write();
            if correlations.get(&correlation_id) == Some(&id) {
                correlations.remove(&correlation_id);
            }
        }

        let outcome = session.shutdown(self.options.shutdown_timeout).await;
        log::info!("Killed session {id}: {outcome:?}");
        Some(outcome)
    }

    /// Kill every session
    pub async fn shutdown(&self) {
        let ids: Vec<SessionId> = self.sessions.read().keys().copied().collect();
        futures::future::join_all(ids.into_iter().map(|id| self.kill(id))).await;
    }

    /// Restorable description of every session that has not exited
    #[must_use]
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.list()
            .iter()
            .filter(|s| s.activity_state() != ActivityState::Exited)
            .map(|s| SessionSnapshot::from(&s.info()))
            .collect()
    }

    /// Start fresh sessions for stored snapshots
    ///
    /// Missing directories and failed spawns are logged and skipped. With a
    /// resume flag configured, `<flag> <correlation_id>` is passed so the
    /// hosted CLI can pick up its own state. Restored sessions start
    /// uncorrelated.
    pub async fn restore(&self, snapshots: Vec<SessionSnapshot>) -> Vec<Arc<Session>> {
        let mut restored = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            if !snapshot.working_directory.is_dir() {
                log::warn!(
                    "Skipping restore of {}: directory no longer exists",
                    snapshot.working_directory.display()
                );
                continue;
            }

            let mut request = CreateSessionRequest::new(&snapshot.working_directory);
            if let (Some(flag), Some(correlation_id)) =
                (&self.options.resume_flag, &snapshot.correlation_id)
            {
                request = request.args([flag.clone(), correlation_id.to_string()]);
            }
            request.custom_name = snapshot.custom_name;
            request.custom_color = snapshot.custom_color;
            request.sort_order = Some(snapshot.sort_order);
            self.next_sort_order
                .fetch_max(snapshot.sort_order.saturating_add(1), Ordering::Relaxed);

            match self.create(request).await {
                Ok(session) => restored.push(session),
                Err(e) => log::warn!(
                    "Failed to restore session in {}: {e}",
                    snapshot.working_directory.display()
                ),
            }
        }
        restored
    }

    /// Untracked processes that look like the hosted executable; never kills
    #[must_use]
    pub fn scan_for_orphans(&self) -> Vec<OrphanProcess> {
        let tracked: HashSet<u32> = self
            .sessions
            .read()
            .values()
            .filter_map(|s| s.process_id())
            .collect();
        scan_for_orphans(&self.options.executable, &tracked)
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .field("correlations", &self.correlations.read().len())
            .finish_non_exhaustive()
    }
}
