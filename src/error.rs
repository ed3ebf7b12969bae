//! Error types for the session engine

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the session engine
#[derive(Error, Debug)]
pub enum DirectorError {
    /// Hosted executable could not be resolved
    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    /// Working directory for a new session does not exist
    #[error("Working directory not found: {}", .0.display())]
    WorkingDirectoryNotFound(PathBuf),

    /// The pseudo-terminal or child process could not be started
    #[error("Spawn error: {0}")]
    Spawn(String),

    /// Pseudo-terminal operation failed after spawn (resize, write)
    #[error("PTY error: {0}")]
    Pty(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decode error on the control channel or state file
    #[error("JSON decode error: {0}")]
    JsonDecode(#[from] serde_json::Error),

    /// Control channel transport error (bind, accept)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Session not found in the registry
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Correlation id is already bound to another session
    #[error("Correlation id {correlation_id} already bound to session {session_id}")]
    CorrelationConflict {
        /// Correlation id that was requested
        correlation_id: String,
        /// Session currently holding it
        session_id: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Persisted state could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Result type alias for session engine operations
pub type Result<T> = std::result::Result<T, DirectorError>;

impl DirectorError {
    /// Create an executable-not-found error
    pub fn executable_not_found(name: impl Into<String>) -> Self {
        Self::ExecutableNotFound(name.into())
    }

    /// Create a working-directory-not-found error
    pub fn working_directory_not_found(path: impl Into<PathBuf>) -> Self {
        Self::WorkingDirectoryNotFound(path.into())
    }

    /// Create a spawn error
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    /// Create a pty error
    pub fn pty(msg: impl Into<String>) -> Self {
        Self::Pty(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a session not found error
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound(session_id.into())
    }

    /// Create a correlation conflict error
    pub fn correlation_conflict(
        correlation_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self::CorrelationConflict {
            correlation_id: correlation_id.into(),
            session_id: session_id.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// True for the failures `Create` surfaces when a session cannot be started
    #[must_use]
    pub fn is_spawn_error(&self) -> bool {
        matches!(
            self,
            Self::ExecutableNotFound(_) | Self::WorkingDirectoryNotFound(_) | Self::Spawn(_)
        )
    }
}
