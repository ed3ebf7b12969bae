//! Persisted session list
//!
//! Only what is needed to start equivalent sessions again is stored. A
//! restored session always gets a fresh process; whatever the hosted CLI can
//! resume on its own is reached through the correlation id.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{DirectorError, Result};
use crate::session::SessionInfo;
use crate::types::identifiers::CorrelationId;

const STATE_VERSION: u32 = 1;

/// Restorable description of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Working directory
    pub working_directory: PathBuf,
    /// External session id, used to resume the CLI's own state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    /// Colour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_color: Option<String>,
    /// Position in listings
    #[serde(default)]
    pub sort_order: i64,
}

impl From<&SessionInfo> for SessionSnapshot {
    fn from(info: &SessionInfo) -> Self {
        Self {
            working_directory: info.working_directory.clone(),
            correlation_id: info.correlation_id.clone(),
            custom_name: info.custom_name.clone(),
            custom_color: info.custom_color.clone(),
            sort_order: info.sort_order,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    #[serde(default)]
    sessions: Vec<SessionSnapshot>,
}

/// JSON file holding the session list
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored sessions; a missing file is an empty list
    ///
    /// # Errors
    /// Returns `Persistence` if the file exists but cannot be read or parsed
    pub fn load(&self) -> Result<Vec<SessionSnapshot>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(DirectorError::persistence(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        let state: StateFile = serde_json::from_str(&content).map_err(|e| {
            DirectorError::persistence(format!("Failed to parse {}: {e}", self.path.display()))
        })?;
        if state.version > STATE_VERSION {
            log::warn!(
                "{} has version {}, newer than {STATE_VERSION}; reading known fields only",
                self.path.display(),
                state.version
            );
        }
        Ok(state.sessions)
    }

    /// Replace the stored sessions atomically
    ///
    /// # Errors
    /// Returns `Persistence` if the file cannot be written
    pub fn save(&self, sessions: &[SessionSnapshot]) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| {
            DirectorError::persistence(format!("Failed to create {}: {e}", parent.display()))
        })?;

        let state = StateFile {
            version: STATE_VERSION,
            sessions: sessions.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&state)?;

        let mut file = NamedTempFile::new_in(parent)
            .map_err(|e| DirectorError::persistence(format!("Failed to create temp file: {e}")))?;
        file.write_all(&json)
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| DirectorError::persistence(format!("Failed to write state: {e}")))?;
        file.persist(&self.path).map_err(|e| {
            DirectorError::persistence(format!("Failed to replace {}: {}", self.path.display(), e.error))
        })?;
        Ok(())
    }
}
