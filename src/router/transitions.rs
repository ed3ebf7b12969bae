//! Activity state machine
//!
//! Transitions are a pure function of the current state and a trigger, so the
//! whole table is testable without a process or a socket.

use crate::control::ControlMessage;
use crate::types::activity::ActivityState;
use crate::types::hooks::{HookEvent, PERMISSION_PROMPT_NOTIFICATION};

/// Something that may move a session to a new activity state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// A hook event from the control channel
    Hook {
        /// Event name
        event: HookEvent,
        /// `notification_type`, for `Notification`
        notification_kind: Option<String>,
    },
    /// Input was written to the session locally
    InputSent,
    /// The hosted process exited
    ProcessExited,
}

impl Trigger {
    /// Hook trigger without a notification kind
    #[must_use]
    pub const fn hook(event: HookEvent) -> Self {
        Self::Hook {
            event,
            notification_kind: None,
        }
    }

    /// Notification hook with the given kind
    pub fn notification(kind: impl Into<String>) -> Self {
        Self::Hook {
            event: HookEvent::Notification,
            notification_kind: Some(kind.into()),
        }
    }
}

impl From<&ControlMessage> for Trigger {
    fn from(message: &ControlMessage) -> Self {
        Self::Hook {
            event: message.event.clone(),
            notification_kind: message.notification_kind.clone(),
        }
    }
}

/// State reached from `current` on `trigger`, or `None` if nothing changes
///
/// `Exited` is absorbing. Informational and unknown events never transition.
#[must_use]
pub fn next_state(current: ActivityState, trigger: &Trigger) -> Option<ActivityState> {
    if current.is_terminal() {
        return None;
    }

    let next = match trigger {
        Trigger::InputSent => ActivityState::Working,
        Trigger::ProcessExited => ActivityState::Exited,
        Trigger::Hook {
            event,
            notification_kind,
        } => match event {
            HookEvent::SessionStart => ActivityState::Idle,
            HookEvent::UserPromptSubmit
            | HookEvent::PreToolUse
            | HookEvent::PostToolUse
            | HookEvent::PostToolUseFailure
            | HookEvent::SubagentStart
            | HookEvent::SubagentStop
            | HookEvent::TaskCompleted => ActivityState::Working,
            HookEvent::PermissionRequest => ActivityState::WaitingForPermission,
            HookEvent::Notification
                if notification_kind.as_deref() == Some(PERMISSION_PROMPT_NOTIFICATION) =>
            {
                ActivityState::WaitingForPermission
            }
            HookEvent::Notification | HookEvent::Stop => ActivityState::WaitingForInput,
            HookEvent::SessionEnd => ActivityState::Exited,
            HookEvent::TeammateIdle | HookEvent::PreCompact => return None,
            HookEvent::Unknown(name) => {
                log::debug!("Unknown hook event {name:?}; no transition");
                return None;
            }
        },
    };

    (next != current).then_some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_events_from_idle() {
        for event in [
            HookEvent::UserPromptSubmit,
            HookEvent::PreToolUse,
            HookEvent::PostToolUse,
            HookEvent::PostToolUseFailure,
            HookEvent::SubagentStart,
            HookEvent::SubagentStop,
            HookEvent::TaskCompleted,
        ] {
            assert_eq!(
                next_state(ActivityState::Idle, &Trigger::hook(event.clone())),
                Some(ActivityState::Working),
                "{event}"
            );
        }
    }

    #[test]
    fn notification_kind_selects_permission_or_input() {
        let permission = Trigger::notification(PERMISSION_PROMPT_NOTIFICATION);
        let idle = Trigger::notification("idle_prompt");
        assert_eq!(
            next_state(ActivityState::Working, &permission),
            Some(ActivityState::WaitingForPermission)
        );
        assert_eq!(
            next_state(ActivityState::Working, &idle),
            Some(ActivityState::WaitingForInput)
        );
        assert_eq!(
            next_state(ActivityState::Working, &Trigger::hook(HookEvent::Notification)),
            Some(ActivityState::WaitingForInput)
        );
    }

    #[test]
    fn same_state_is_not_a_transition() {
        assert_eq!(
            next_state(ActivityState::Working, &Trigger::hook(HookEvent::PreToolUse)),
            None
        );
    }

    #[test]
    fn exited_absorbs_everything() {
        for trigger in [
            Trigger::hook(HookEvent::SessionStart),
            Trigger::InputSent,
            Trigger::ProcessExited,
        ] {
            assert_eq!(next_state(ActivityState::Exited, &trigger), None);
        }
    }

    #[test]
    fn informational_and_unknown_events_do_not_transition() {
        for event in [
            HookEvent::TeammateIdle,
            HookEvent::PreCompact,
            HookEvent::Unknown("Mystery".into()),
        ] {
            assert_eq!(next_state(ActivityState::Working, &Trigger::hook(event)), None);
        }
    }
}
