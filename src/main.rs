// Session engine host
//
// Starts the control channel, restores persisted sessions, opens a session for
// every directory given on the command line and runs until Ctrl-C.

use anyhow::{Context, Result};
use kodegen_claude_director::{CreateSessionRequest, EngineOptions, SessionEngine, SessionEvent};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = EngineOptions::from_env().context("Invalid CLAUDE_DIRECTOR_* configuration")?;
    let engine = SessionEngine::start(options)
        .await
        .context("Failed to start session engine")?;
    log::info!(
        "kodegen-claude-director {} listening on {}",
        kodegen_claude_director::VERSION,
        engine.endpoint()
    );

    for orphan in engine.scan_for_orphans() {
        log::warn!(
            "Untracked process {} ({}) in {:?}: {}",
            orphan.pid,
            orphan.name,
            orphan.working_directory,
            orphan.command_line
        );
    }

    engine.on_event(|event| match event {
        SessionEvent::ActivityStateChanged { session_id, old, new } if new.needs_attention() => {
            log::warn!("Session {session_id}: {old} -> {new}, waiting on the operator");
        }
        SessionEvent::ActivityStateChanged { session_id, old, new } => {
            log::info!("Session {session_id}: {old} -> {new}");
        }
        SessionEvent::Correlated {
            session_id,
            correlation_id,
        } => log::info!("Session {session_id} bound to {correlation_id}"),
        SessionEvent::Exited {
            session_id,
            exit_code,
        } => log::info!("Session {session_id} exited ({exit_code})"),
    });

    engine.restore_persisted().await;

    for dir in std::env::args().skip(1) {
        if let Err(e) = engine.create_session(CreateSessionRequest::new(&dir)).await {
            log::error!("Could not start session in {dir}: {e}");
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    log::info!("Shutting down {} session(s)", engine.registry().len());
    engine.shutdown().await;
    Ok(())
}
