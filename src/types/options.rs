//! Engine options and configuration
//!
//! This module contains the configuration for the session engine, including a
//! builder for programmatic setup and an environment overlay for the binaries.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::control::ControlEndpoint;
use crate::error::{DirectorError, Result};

/// Default hosted executable
pub const DEFAULT_EXECUTABLE: &str = "claude";

/// Default raw output retained per session (2 MiB)
pub const DEFAULT_BUFFER_CAPACITY: usize = 2 * 1024 * 1024;

/// Default scrollback rows kept by a terminal parser
pub const DEFAULT_SCROLLBACK_LINES: usize = 5_000;

/// Default per-connection read timeout on the control channel
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound for graceful shutdown before the process tree is killed
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of raw control messages kept for diagnostics
pub const DEFAULT_DIAGNOSTIC_LOG_CAPACITY: usize = 256;

/// Environment variables that are never forwarded from user-supplied overrides
///
/// These change how the child loads and executes code.
pub const BLOCKED_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "NODE_OPTIONS",
    "PYTHONPATH",
    "PERL5LIB",
    "RUBYLIB",
];

/// Variable through which hosted processes (and their hook relays) learn the endpoint
pub const ENDPOINT_ENV_VAR: &str = "CLAUDE_DIRECTOR_ENDPOINT";

const APP_DIR: &str = "kodegen-claude-director";

// ============================================================================
// Engine Options
// ============================================================================

/// Main options for the session engine
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Hosted executable, a name looked up on `PATH` or an explicit path
    pub executable: String,
    /// Arguments passed to every new session
    pub default_args: Vec<String>,
    /// Initial terminal width
    pub cols: u16,
    /// Initial terminal height
    pub rows: u16,
    /// Raw bytes retained per session
    pub buffer_capacity: usize,
    /// Scrollback rows for parsers created by the engine
    pub scrollback_lines: usize,
    /// Control channel listen address
    pub endpoint: ControlEndpoint,
    /// Per-connection read timeout on the control channel
    pub read_timeout: Duration,
    /// Graceful shutdown bound used by `kill`
    pub shutdown_timeout: Duration,
    /// Capacity of the raw control message log
    pub diagnostic_log_capacity: usize,
    /// Where session snapshots are persisted, `None` disables persistence
    pub state_file: Option<PathBuf>,
    /// CLI flag used to resume a previous conversation on restore (e.g. `--resume`)
    pub resume_flag: Option<String>,
    /// Extra environment for hosted processes
    pub env: HashMap<String, String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.to_string(),
            default_args: Vec::new(),
            cols: 120,
            rows: 40,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            scrollback_lines: DEFAULT_SCROLLBACK_LINES,
            endpoint: ControlEndpoint::default_for_platform(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            diagnostic_log_capacity: DEFAULT_DIAGNOSTIC_LOG_CAPACITY,
            state_file: Some(default_state_file()),
            resume_flag: None,
            env: HashMap::new(),
        }
    }
}

impl EngineOptions {
    /// Create a new builder for `EngineOptions`
    #[must_use]
    pub fn builder() -> EngineOptionsBuilder {
        EngineOptionsBuilder::default()
    }

    /// Defaults overlaid with `CLAUDE_DIRECTOR_*` environment variables
    ///
    /// # Errors
    /// Returns `InvalidConfig` if a variable is present but cannot be parsed
    pub fn from_env() -> Result<Self> {
        Self::default().overlay_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    ///
    /// # Errors
    /// Returns `InvalidConfig` if a value cannot be parsed
    pub fn overlay_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(executable) = lookup("CLAUDE_DIRECTOR_EXECUTABLE") {
            self.executable = executable;
        }
        if let Some(endpoint) = lookup(ENDPOINT_ENV_VAR) {
            self.endpoint = endpoint.parse()?;
        }
        if let Some(path) = lookup("CLAUDE_DIRECTOR_STATE_FILE") {
            self.state_file = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if let Some(bytes) = lookup("CLAUDE_DIRECTOR_BUFFER_BYTES") {
            self.buffer_capacity = parse_positive("CLAUDE_DIRECTOR_BUFFER_BYTES", &bytes)?;
        }
        if let Some(ms) = lookup("CLAUDE_DIRECTOR_SHUTDOWN_TIMEOUT_MS") {
            let ms = parse_positive("CLAUDE_DIRECTOR_SHUTDOWN_TIMEOUT_MS", &ms)?;
            self.shutdown_timeout = Duration::from_millis(ms as u64);
        }
        if let Some(flag) = lookup("CLAUDE_DIRECTOR_RESUME_FLAG") {
            self.resume_flag = Some(flag).filter(|f| !f.is_empty());
        }
        Ok(self)
    }

    /// Environment for a hosted process: user overrides minus blocked names,
    /// plus the variables every session needs
    #[must_use]
    pub fn child_env(&self) -> HashMap<String, String> {
        let mut env: HashMap<String, String> = self
            .env
            .iter()
            .filter(|(key, _)| !BLOCKED_ENV_VARS.contains(&key.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        env.insert("TERM".to_string(), "xterm-256color".to_string());
        env.insert(ENDPOINT_ENV_VAR.to_string(), self.endpoint.to_string());
        env
    }
}

fn parse_positive(name: &str, value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(DirectorError::invalid_config(format!(
            "{name} must be a positive integer, got {value:?}"
        ))),
    }
}

/// Default location of the persisted session list
#[must_use]
pub fn default_state_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("sessions.json")
}

/// Directory holding the default control socket
#[must_use]
pub fn default_runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

// ============================================================================
// Builder for EngineOptions
// ============================================================================

/// Builder for `EngineOptions`
#[derive(Debug, Default)]
pub struct EngineOptionsBuilder {
    options: EngineOptions,
}

impl EngineOptionsBuilder {
    /// Set the hosted executable
    #[must_use]
    pub fn executable(mut self, executable: impl Into<String>) -> Self {
        self.options.executable = executable.into();
        self
    }

    /// Set arguments passed to every session
    #[must_use]
    pub fn default_args(mut self, args: Vec<impl Into<String>>) -> Self {
        self.options.default_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the initial terminal size
    #[must_use]
    pub const fn size(mut self, cols: u16, rows: u16) -> Self {
        self.options.cols = cols;
        self.options.rows = rows;
        self
    }

    /// Set raw bytes retained per session
    ///
    /// # Panics
    /// Panics if `bytes` is zero
    #[must_use]
    pub fn buffer_capacity(mut self, bytes: usize) -> Self {
        assert!(bytes > 0, "buffer_capacity must be non-zero");
        self.options.buffer_capacity = bytes;
        self
    }

    /// Set scrollback rows for engine-created parsers
    #[must_use]
    pub const fn scrollback_lines(mut self, lines: usize) -> Self {
        self.options.scrollback_lines = lines;
        self
    }

    /// Set the control channel endpoint
    #[must_use]
    pub fn endpoint(mut self, endpoint: ControlEndpoint) -> Self {
        self.options.endpoint = endpoint;
        self
    }

    /// Set the per-connection read timeout
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.options.read_timeout = timeout;
        self
    }

    /// Set the graceful shutdown bound
    #[must_use]
    pub const fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.options.shutdown_timeout = timeout;
        self
    }

    /// Set the diagnostic log capacity
    #[must_use]
    pub const fn diagnostic_log_capacity(mut self, capacity: usize) -> Self {
        self.options.diagnostic_log_capacity = capacity;
        self
    }

    /// Set or disable the state file
    #[must_use]
    pub fn state_file(mut self, path: Option<PathBuf>) -> Self {
        self.options.state_file = path;
        self
    }

    /// Set the resume flag used on restore
    #[must_use]
    pub fn resume_flag(mut self, flag: impl Into<String>) -> Self {
        self.options.resume_flag = Some(flag.into());
        self
    }

    /// Add an environment variable for hosted processes
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    /// Build the options
    #[must_use]
    pub fn build(self) -> EngineOptions {
        self.options
    }
}
