//! Core type definitions
//!
//! - `identifiers`: session and correlation id newtypes
//! - `hooks`: hook event names from the hosted CLI
//! - `activity`: the per-session activity state
//! - `options`: engine configuration and its builder

pub mod activity;
pub mod hooks;
pub mod identifiers;
pub mod options;

pub use activity::ActivityState;
pub use hooks::{HookEvent, PERMISSION_PROMPT_NOTIFICATION};
pub use identifiers::{CorrelationId, SessionId};
pub use options::{EngineOptions, EngineOptionsBuilder};
