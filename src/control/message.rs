//! Control channel message types
//!
//! `HookMessage` is the flat snake_case object a relay writes; `ControlMessage`
//! is the decoded form the router and the diagnostic log work with.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::hooks::HookEvent;
use crate::types::identifiers::CorrelationId;

/// One hook invocation as written on the wire
///
/// Unknown fields are ignored so newer CLIs can add to the payload freely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookMessage {
    /// Hook event name, e.g. `SessionStart`
    pub hook_event_name: String,
    /// The CLI's own session identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Working directory of the CLI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Tool involved, for tool hooks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Notification subtype, e.g. `permission_prompt`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,
    /// Free-form detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Decoded control message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlMessage {
    /// Event that fired
    pub event: HookEvent,
    /// External session identifier, if the hook reported one
    pub correlation_id: Option<CorrelationId>,
    /// Working directory the hook reported
    pub working_directory: Option<PathBuf>,
    /// Tool name for tool hooks
    pub tool_name: Option<String>,
    /// Notification subtype
    pub notification_kind: Option<String>,
    /// Free-form detail
    pub detail: Option<String>,
    /// When the server decoded the message
    pub received_at: DateTime<Utc>,
}

impl ControlMessage {
    /// Decode one JSON line
    ///
    /// # Errors
    /// Returns `JsonDecode` for malformed JSON or a missing `hook_event_name`
    pub fn parse(line: &str) -> Result<Self> {
        let wire: HookMessage = serde_json::from_str(line)?;
        Ok(Self::from_wire(wire, Utc::now()))
    }

    /// Convert a wire message, treating empty strings as absent
    #[must_use]
    pub fn from_wire(wire: HookMessage, received_at: DateTime<Utc>) -> Self {
        Self {
            event: HookEvent::from_name(&wire.hook_event_name),
            correlation_id: non_empty(wire.session_id).map(CorrelationId::new),
            working_directory: non_empty(wire.cwd).map(PathBuf::from),
            tool_name: non_empty(wire.tool_name),
            notification_kind: non_empty(wire.notification_type),
            detail: non_empty(wire.message),
            received_at,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
