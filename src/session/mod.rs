//! Session aggregate: one hosted process, its buffer and its activity state

pub mod events;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::buffer::CircularByteBuffer;
use crate::error::Result;
use crate::pty::{ChildProcessHost, ShutdownOutcome, TerminalSize};
use crate::router::transitions::{Trigger, next_state};
use crate::terminal::{AnsiTerminalParser, TerminalFeed};
use crate::types::activity::ActivityState;
use crate::types::identifiers::{CorrelationId, SessionId};

pub use events::{EventBus, SessionEvent};

/// Serializable view of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Local id
    pub id: SessionId,
    /// Canonical working directory
    pub working_directory: PathBuf,
    /// OS process id of the hosted process
    pub process_id: Option<u32>,
    /// Current activity
    pub activity_state: ActivityState,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Last state change
    pub last_activity_at: DateTime<Utc>,
    /// Operator-chosen display name
    pub custom_name: Option<String>,
    /// Operator-chosen colour
    pub custom_color: Option<String>,
    /// Position in listings
    pub sort_order: i64,
    /// Bound external session id
    pub correlation_id: Option<CorrelationId>,
    /// Exit code once exited
    pub exit_code: Option<i32>,
    /// Total bytes of output received
    pub output_bytes: u64,
}

/// Operator-controlled presentation fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionLabels {
    /// Display name
    pub custom_name: Option<String>,
    /// Colour
    pub custom_color: Option<String>,
    /// Position in listings
    pub sort_order: i64,
}

#[derive(Debug)]
struct SessionState {
    activity: ActivityState,
    correlation_id: Option<CorrelationId>,
    labels: SessionLabels,
    last_activity_at: DateTime<Utc>,
    exit_code: Option<i32>,
    // Routed by cwd before any session_id was seen
    contacted_without_id: bool,
    size: TerminalSize,
}

/// One running agent
pub struct Session {
    id: SessionId,
    working_directory: PathBuf,
    created_at: DateTime<Utc>,
    buffer: Arc<CircularByteBuffer>,
    scrollback_lines: usize,
    host: ChildProcessHost,
    state: Mutex<SessionState>,
    // Held from computing a transition until its event is published
    transitions: Mutex<()>,
    events: Arc<EventBus>,
    exit_reported: AtomicBool,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        working_directory: PathBuf,
        buffer: Arc<CircularByteBuffer>,
        host: ChildProcessHost,
        size: TerminalSize,
        scrollback_lines: usize,
        labels: SessionLabels,
        events: Arc<EventBus>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            working_directory,
            created_at: now,
            buffer,
            scrollback_lines,
            host,
            state: Mutex::new(SessionState {
                activity: ActivityState::Starting,
                correlation_id: None,
                labels,
                last_activity_at: now,
                exit_code: None,
                contacted_without_id: false,
                size,
            }),
            transitions: Mutex::new(()),
            events,
            exit_reported: AtomicBool::new(false),
        }
    }

    /// Local id
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Canonical working directory
    #[must_use]
    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// Creation time
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// OS process id of the hosted process
    #[must_use]
    pub const fn process_id(&self) -> Option<u32> {
        self.host.process_id()
    }

    /// Raw output buffer
    #[must_use]
    pub const fn buffer(&self) -> &Arc<CircularByteBuffer> {
        &self.buffer
    }

    /// Current activity state
    #[must_use]
    pub fn activity_state(&self) -> ActivityState {
        self.state.lock().activity
    }

    /// Bound external session id
    #[must_use]
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.state.lock().correlation_id.clone()
    }

    /// Exit code once the process has exited
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.state.lock().exit_code
    }

    /// Presentation fields
    #[must_use]
    pub fn labels(&self) -> SessionLabels {
        self.state.lock().labels.clone()
    }

    /// Apply a trigger; returns `(old, new)` if the state changed
    ///
    /// Exactly one `ActivityStateChanged` event is raised per change, and
    /// events for one session are published in the order the changes were
    /// made. Event callbacks must not apply triggers to the session that
    /// raised the event.
    pub fn apply(&self, trigger: &Trigger) -> Option<(ActivityState, ActivityState)> {
        let _ordered = self.transitions.lock();
        let transition = {
            let mut state = self.state.lock();
            let old = state.activity;
            let new = next_state(old, trigger)?;
            state.activity = new;
            state.last_activity_at = Utc::now();
            (old, new)
        };

        log::debug!("Session {} {} -> {}", self.id, transition.0, transition.1);
        self.events.emit(SessionEvent::ActivityStateChanged {
            session_id: self.id,
            old: transition.0,
            new: transition.1,
        });
        Some(transition)
    }

    /// Type a line: `text` followed by carriage return
    ///
    /// # Errors
    /// Returns `Io` if the terminal is closed
    pub fn send_input(&self, text: &str) -> Result<()> {
        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(b'\r');
        self.host.write(&line)?;
        self.apply(&Trigger::InputSent);
        Ok(())
    }

    /// Raw passthrough (keystrokes, paste); no state change
    ///
    /// # Errors
    /// Returns `Io` if the terminal is closed
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        self.host.write(bytes)
    }

    /// Resize the terminal
    ///
    /// # Errors
    /// Returns `Pty` if the backend rejects the size
    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        let size = TerminalSize::new(cols, rows);
        self.host.resize(size)?;
        self.state.lock().size = size;
        Ok(())
    }

    /// Current terminal size
    #[must_use]
    pub fn terminal_size(&self) -> TerminalSize {
        self.state.lock().size
    }

    /// Parser feed positioned at the start of this session's buffer
    ///
    /// The parser matches the current terminal size and keeps the
    /// configured number of scrollback rows.
    #[must_use]
    pub fn terminal_feed(&self) -> TerminalFeed {
        let size = self.terminal_size();
        TerminalFeed::new(AnsiTerminalParser::new(
            usize::from(size.cols),
            usize::from(size.rows),
            self.scrollback_lines,
        ))
    }

    /// Set or clear the display name
    pub fn set_custom_name(&self, name: Option<String>) {
        self.state.lock().labels.custom_name = name;
    }

    /// Set or clear the colour
    pub fn set_custom_color(&self, color: Option<String>) {
        self.state.lock().labels.custom_color = color;
    }

    /// Set the listing position
    pub fn set_sort_order(&self, order: i64) {
        self.state.lock().labels.sort_order = order;
    }

    /// Snapshot for display or serialization
    #[must_use]
    pub fn info(&self) -> SessionInfo {
        let state = self.state.lock();
        SessionInfo {
            id: self.id,
            working_directory: self.working_directory.clone(),
            process_id: self.host.process_id(),
            activity_state: state.activity,
            created_at: self.created_at,
            last_activity_at: state.last_activity_at,
            custom_name: state.labels.custom_name.clone(),
            custom_color: state.labels.custom_color.clone(),
            sort_order: state.labels.sort_order,
            correlation_id: state.correlation_id.clone(),
            exit_code: state.exit_code,
            output_bytes: self.buffer.total_written(),
        }
    }

    /// Bind a correlation id if none is bound yet
    pub(crate) fn bind_correlation(&self, correlation_id: CorrelationId) -> bool {
        let mut state = self.state.lock();
        if state.correlation_id.is_some() {
            return false;
        }
        state.correlation_id = Some(correlation_id);
        true
    }

    /// Replace the correlation id, returning the previous one
    pub(crate) fn replace_correlation(&self, correlation_id: CorrelationId) -> Option<CorrelationId> {
        self.state.lock().correlation_id.replace(correlation_id)
    }

    /// True while first-contact correlation may pick this session
    ///
    /// A session that has only been reached by `cwd` stays eligible after
    /// leaving `Starting`, until it is bound or exits.
    pub(crate) fn awaiting_correlation(&self) -> bool {
        let state = self.state.lock();
        state.correlation_id.is_none()
            && (state.activity == ActivityState::Starting
                || (state.contacted_without_id && !state.activity.is_terminal()))
    }

    /// Record delivery of a message that carried no `session_id`
    pub(crate) fn note_contact_without_id(&self) {
        self.state.lock().contacted_without_id = true;
    }

    /// Wait for the process to end and report it once
    pub(crate) async fn monitor_exit(&self) {
        let code = self.host.wait_exit().await;
        self.mark_exited(code);
    }

    /// Record process exit; only the first call has any effect
    pub(crate) fn mark_exited(&self, exit_code: i32) {
        if self.exit_reported.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.lock().exit_code = Some(exit_code);
        self.apply(&Trigger::ProcessExited);
        log::info!("Session {} exited with code {exit_code}", self.id);
        self.events.emit(SessionEvent::Exited {
            session_id: self.id,
            exit_code,
        });
    }

    pub(crate) async fn shutdown(&self, timeout: Duration) -> ShutdownOutcome {
        self.host.request_graceful_shutdown(timeout).await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("working_directory", &self.working_directory)
            .field("host", &self.host)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}
