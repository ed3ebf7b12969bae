//! Pseudo-terminal hosting
//!
//! The engine talks to terminals only through [`PtyBackend`]. The native
//! implementation lives in [`native`] and is selected once at startup by
//! [`default_backend`]; tests substitute a scripted backend.

pub mod host;
pub mod native;

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;

pub use host::{ChildProcessHost, ShutdownOutcome};
pub use native::NativePtyBackend;

/// Terminal size in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    /// Columns
    pub cols: u16,
    /// Rows
    pub rows: u16,
}

impl TerminalSize {
    /// Size with both dimensions clamped to at least one cell
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols: cols.max(1),
            rows: rows.max(1),
        }
    }
}

/// Everything needed to start one hosted process
#[derive(Debug, Clone)]
pub struct SpawnCommand {
    /// Executable name or path
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory, already verified to exist
    pub working_directory: PathBuf,
    /// Variables added to the inherited environment
    pub env: HashMap<String, String>,
    /// Initial terminal size
    pub size: TerminalSize,
}

/// Live resize of the terminal attached to a child
pub trait PtyControl: Send {
    /// Propagate a new size to the child
    ///
    /// # Errors
    /// Returns `Pty` if the size cannot be applied
    fn resize(&self, size: TerminalSize) -> Result<()>;
}

/// Signals delivered to a running child and its process tree
pub trait ProcessSignaller: Send + Sync {
    /// Ask the process to stop (Ctrl-C semantics)
    ///
    /// # Errors
    /// Returns an error if the platform cannot deliver an interrupt; the
    /// host then falls back to writing ETX into the terminal.
    fn interrupt(&self) -> Result<()>;

    /// Terminate the process tree unconditionally
    ///
    /// # Errors
    /// Returns an error if the process could not be signalled
    fn kill(&self) -> Result<()>;
}

/// Handle to the spawned child
pub trait ChildHandle: Send {
    /// OS process id, when known
    fn process_id(&self) -> Option<u32>;

    /// Signaller usable from any thread while `wait` blocks
    fn signaller(&self) -> Arc<dyn ProcessSignaller>;

    /// Block until the child exits and return its exit code
    ///
    /// # Errors
    /// Returns an error if the exit status cannot be collected
    fn wait(&mut self) -> Result<i32>;
}

/// Parts of a freshly spawned process, handed to [`ChildProcessHost`]
pub struct SpawnedProcess {
    /// Terminal output
    pub reader: Box<dyn Read + Send>,
    /// Terminal input
    pub writer: Box<dyn Write + Send>,
    /// Resize control
    pub control: Box<dyn PtyControl>,
    /// The child itself
    pub child: Box<dyn ChildHandle>,
}

/// Capability interface over the platform pseudo-terminal
pub trait PtyBackend: Send + Sync {
    /// Open a terminal and start `command` attached to it
    ///
    /// # Errors
    /// Returns `ExecutableNotFound` if the program cannot be resolved and
    /// `Spawn` for any other start-up failure
    fn spawn(&self, command: &SpawnCommand) -> Result<SpawnedProcess>;
}

/// Backend for the current platform
#[must_use]
pub fn default_backend() -> Arc<dyn PtyBackend> {
    Arc::new(NativePtyBackend::new())
}
