//! Hook event names emitted by the hosted CLI's lifecycle hooks

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Hook Types
// ============================================================================

/// Hook event types (`hook_event_name` on the wire)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// A CLI session started or resumed
    SessionStart,
    /// When user submits a prompt
    UserPromptSubmit,
    /// Before a tool is used
    PreToolUse,
    /// After a tool is used
    PostToolUse,
    /// After a tool invocation failed
    PostToolUseFailure,
    /// A subagent was launched
    SubagentStart,
    /// When a subagent stops
    SubagentStop,
    /// A task list item completed
    TaskCompleted,
    /// The CLI is asking for tool permission
    PermissionRequest,
    /// Generic notification (see `notification_type`)
    Notification,
    /// The agent finished its turn
    Stop,
    /// A teammate agent went idle
    TeammateIdle,
    /// Before compacting the conversation
    PreCompact,
    /// The CLI session ended
    SessionEnd,
    /// Anything this build does not know about
    Unknown(String),
}

impl HookEvent {
    /// Parse a wire event name; unrecognised names are preserved
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "SessionStart" => Self::SessionStart,
            "UserPromptSubmit" => Self::UserPromptSubmit,
            "PreToolUse" => Self::PreToolUse,
            "PostToolUse" => Self::PostToolUse,
            "PostToolUseFailure" => Self::PostToolUseFailure,
            "SubagentStart" => Self::SubagentStart,
            "SubagentStop" => Self::SubagentStop,
            "TaskCompleted" => Self::TaskCompleted,
            "PermissionRequest" => Self::PermissionRequest,
            "Notification" => Self::Notification,
            "Stop" => Self::Stop,
            "TeammateIdle" => Self::TeammateIdle,
            "PreCompact" => Self::PreCompact,
            "SessionEnd" => Self::SessionEnd,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Wire name of the event
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::SessionStart => "SessionStart",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::PostToolUseFailure => "PostToolUseFailure",
            Self::SubagentStart => "SubagentStart",
            Self::SubagentStop => "SubagentStop",
            Self::TaskCompleted => "TaskCompleted",
            Self::PermissionRequest => "PermissionRequest",
            Self::Notification => "Notification",
            Self::Stop => "Stop",
            Self::TeammateIdle => "TeammateIdle",
            Self::PreCompact => "PreCompact",
            Self::SessionEnd => "SessionEnd",
            Self::Unknown(name) => name,
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for HookEvent {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

impl Serialize for HookEvent {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for HookEvent {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// `notification_type` value that means the CLI is waiting on a permission prompt
pub const PERMISSION_PROMPT_NOTIFICATION: &str = "permission_prompt";
