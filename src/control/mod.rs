//! Control plane: endpoint, wire messages, listener and hook relay
//!
//! Hosted CLIs report lifecycle hooks by running a relay that writes one JSON
//! line to the [`ControlChannelServer`]. Nothing on this path may block or
//! crash the hosted process.

pub mod endpoint;
pub mod diagnostics;
pub mod message;
pub mod relay;
pub mod server;

pub use endpoint::ControlEndpoint;
pub use diagnostics::DiagnosticLog;
pub use message::{ControlMessage, HookMessage};
pub use relay::{RelayOutcome, deliver};
pub use server::{ControlChannelServer, ControlHandler, DeliveryOutcome, MAX_LINE_BYTES};
