//! # Claude Director session engine
//!
//! Hosts several interactive Claude Code processes on one machine. Each one
//! runs in its own pseudo-terminal with a faithful terminal emulation, while a
//! second, structured channel reports what the agent is doing (idle, working,
//! waiting for permission or input) from the CLI's lifecycle hooks, without
//! parsing the terminal stream.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kodegen_claude_director::{CreateSessionRequest, EngineOptions, SessionEngine, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = SessionEngine::start(EngineOptions::from_env()?).await?;
//!     let mut events = engine.subscribe();
//!
//!     let session = engine
//!         .create_session(CreateSessionRequest::new("/path/to/project"))
//!         .await?;
//!     session.send_input("Summarise the README")?;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let SessionEvent::ActivityStateChanged { new, .. } = event {
//!             log::info!("{} is now {new}", session.id());
//!         }
//!     }
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Rendering
//!
//! Output bytes land in each session's [`CircularByteBuffer`]. A renderer
//! pulls them through a [`TerminalFeed`], which drives an
//! [`AnsiTerminalParser`] and exposes the resulting cell grid:
//!
//! ```no_run
//! # use kodegen_claude_director::Session;
//! # fn render(session: &Session) {
//! let mut feed = session.terminal_feed();
//! feed.pump(session.buffer());
//! for row in 0..feed.parser().rows() {
//!     let _line = feed.parser().row_text(row);
//! }
//! # }
//! ```
//!
//! ## Hooks
//!
//! The hosted CLI's hooks run the `kodegen-claude-relay` binary, which reads
//! the hook JSON on stdin and forwards it to the endpoint named in
//! `CLAUDE_DIRECTOR_ENDPOINT`. The relay never fails the hook.
//!
//! ## Architecture
//!
//! - [`buffer`]: ring buffer of raw terminal output
//! - [`terminal`]: ANSI/VT100 parser and cell grid
//! - [`pty`]: pseudo-terminal backend and child process host
//! - [`control`]: control endpoint, wire messages, listener and relay
//! - [`router`]: correlation and the activity state machine
//! - [`session`]: per-agent aggregate and events
//! - [`registry`]: session set, persistence and orphan scan
//! - [`engine`]: start-up and shutdown of all of the above
//! - [`error`]: error types

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod control;
pub mod engine;
pub mod error;
pub mod pty;
pub mod registry;
pub mod router;
pub mod session;
pub mod terminal;
pub mod types;

pub use buffer::{CircularByteBuffer, ReadDelta};
pub use control::{
    ControlChannelServer, ControlEndpoint, ControlHandler, ControlMessage, DeliveryOutcome,
    DiagnosticLog, HookMessage, RelayOutcome,
};
pub use engine::SessionEngine;
pub use error::{DirectorError, Result};
pub use pty::{ChildProcessHost, PtyBackend, ShutdownOutcome, SpawnCommand, TerminalSize};
pub use registry::{
    CreateSessionRequest, OrphanProcess, SessionRegistry, SessionSnapshot, StateStore,
};
pub use router::{DropReason, EventRouter, RouteOutcome, Trigger};
pub use session::{EventBus, Session, SessionEvent, SessionInfo};
pub use terminal::{AnsiTerminalParser, Cell, CellFlags, Color, Cursor, TerminalFeed};
pub use types::{
    ActivityState, CorrelationId, EngineOptions, EngineOptionsBuilder, HookEvent, SessionId,
};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
