//! Conversational activity state of a hosted agent

use std::fmt;

use serde::{Deserialize, Serialize};

/// What the hosted agent is doing, as reported by its hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    /// Process spawned, no hook event seen yet
    Starting,
    /// CLI session is up and has nothing to do
    Idle,
    /// Agent is processing a prompt or running tools
    Working,
    /// Agent finished its turn or raised a notification; operator's move
    WaitingForInput,
    /// Agent is blocked on a permission prompt
    WaitingForPermission,
    /// Process or CLI session ended. Absorbing.
    Exited,
}

impl ActivityState {
    /// True once the session can no longer change state
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Exited)
    }

    /// True while the operator is expected to act
    #[must_use]
    pub const fn needs_attention(self) -> bool {
        matches!(self, Self::WaitingForInput | Self::WaitingForPermission)
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Idle => "idle",
            Self::Working => "working",
            Self::WaitingForInput => "waiting_for_input",
            Self::WaitingForPermission => "waiting_for_permission",
            Self::Exited => "exited",
        };
        f.write_str(name)
    }
}
