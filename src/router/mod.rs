//! Event routing: control messages to sessions
//!
//! A message whose `session_id` is already bound goes straight to its
//! session. An unbound id gets one chance at first-contact correlation: the
//! message's `cwd` must match exactly one uncorrelated session that is still
//! `Starting`, or that so far has only been reached by `cwd`. Zero or several
//! candidates means the message is dropped.

pub mod transitions;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::control::{ControlHandler, ControlMessage};
use crate::registry::{CandidateMatch, FirstContact, SessionRegistry};
use crate::types::activity::ActivityState;
use crate::types::identifiers::SessionId;

pub use transitions::{Trigger, next_state};

/// Why a message reached no session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Neither `session_id` nor `cwd` was present
    MissingIdentity,
    /// `session_id` is unbound and no `cwd` was given to correlate with
    UnknownCorrelation,
    /// No session in that directory is waiting to be correlated
    NoCandidate,
    /// Several sessions matched; refusing to guess
    Ambiguous(usize),
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingIdentity => f.write_str("message carries neither session_id nor cwd"),
            Self::UnknownCorrelation => f.write_str("unknown session_id and no cwd to correlate"),
            Self::NoCandidate => f.write_str("no starting session in that directory"),
            Self::Ambiguous(n) => write!(f, "{n} starting sessions share that directory"),
        }
    }
}

/// Where a message went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Applied to a session
    Delivered {
        /// Target session
        session_id: SessionId,
        /// `(old, new)` if the state changed
        transition: Option<(ActivityState, ActivityState)>,
        /// True if this message bound the correlation
        correlated: bool,
    },
    /// Logged and discarded
    Dropped(DropReason),
}

impl RouteOutcome {
    /// Target session, if delivered
    #[must_use]
    pub const fn session_id(&self) -> Option<SessionId> {
        match self {
            Self::Delivered { session_id, .. } => Some(*session_id),
            Self::Dropped(_) => None,
        }
    }
}

/// Correlates control messages to sessions and drives their state machines
#[derive(Debug, Clone)]
pub struct EventRouter {
    registry: Arc<SessionRegistry>,
}

impl EventRouter {
    /// Router over `registry`
    #[must_use]
    pub const fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Route one message
    pub fn route(&self, message: &ControlMessage) -> RouteOutcome {
        let outcome = self.resolve(message);
        if let RouteOutcome::Dropped(reason) = &outcome {
            log::warn!(
                "Dropped {} (session_id {:?}, cwd {:?}): {reason}",
                message.event,
                message.correlation_id.as_ref().map(|c| c.as_str()),
                message.working_directory,
            );
        }
        outcome
    }

    fn resolve(&self, message: &ControlMessage) -> RouteOutcome {
        let trigger = Trigger::from(message);
        // Canonicalize before any registry lock is taken
        let cwd = message.working_directory.as_deref().map(canonical);

        let Some(correlation_id) = &message.correlation_id else {
            let Some(cwd) = cwd else {
                return RouteOutcome::Dropped(DropReason::MissingIdentity);
            };
            // Uncorrelated delivery: transition but bind nothing
            return match self.registry.awaiting_correlation_in(&cwd) {
                CandidateMatch::One(session) => {
                    session.note_contact_without_id();
                    deliver(&session, &trigger, false)
                }
                CandidateMatch::None => RouteOutcome::Dropped(DropReason::NoCandidate),
                CandidateMatch::Many(n) => RouteOutcome::Dropped(DropReason::Ambiguous(n)),
            };
        };

        if let Some(session) = self.registry.find_by_correlation(correlation_id) {
            return deliver(&session, &trigger, false);
        }

        let Some(cwd) = cwd else {
            return RouteOutcome::Dropped(DropReason::UnknownCorrelation);
        };

        match self.registry.correlate_first_contact(correlation_id, &cwd) {
            FirstContact::AlreadyBound(session) => deliver(&session, &trigger, false),
            FirstContact::Bound(session) => deliver(&session, &trigger, true),
            FirstContact::Unmatched(CandidateMatch::Many(n)) => {
                RouteOutcome::Dropped(DropReason::Ambiguous(n))
            }
            FirstContact::Unmatched(_) => RouteOutcome::Dropped(DropReason::NoCandidate),
        }
    }
}

impl ControlHandler for EventRouter {
    fn handle(&self, message: ControlMessage) {
        self.route(&message);
    }
}

fn deliver(
    session: &crate::session::Session,
    trigger: &Trigger,
    correlated: bool,
) -> RouteOutcome {
    RouteOutcome::Delivered {
        session_id: session.id(),
        transition: session.apply(trigger),
        correlated,
    }
}

/// Resolve symlinks so `/tmp/x` and `/private/tmp/x` compare equal
pub(crate) fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
