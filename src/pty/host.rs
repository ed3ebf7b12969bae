//! Child process host: drain loop, exit watcher, input and shutdown
//!
//! Two dedicated threads run per child because both the terminal read and the
//! exit wait are blocking calls. The drain thread copies output into the
//! session buffer in bounded chunks; its termination is the authoritative end
//! of the stream. The exit thread only collects the exit code.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::buffer::CircularByteBuffer;
use crate::error::{DirectorError, Result};

use super::{ProcessSignaller, PtyBackend, PtyControl, SpawnCommand, TerminalSize};

/// Bytes read from the terminal per drain iteration
pub const DRAIN_CHUNK_SIZE: usize = 8 * 1024;

/// How long the exit is held back waiting for the drain loop to finish
///
/// Covers a grandchild that keeps the terminal open after the child exits.
pub const DRAIN_GRACE: Duration = Duration::from_secs(2);

const ETX: u8 = 0x03;

/// How a graceful shutdown request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The child exited after the interrupt
    Graceful,
    /// The child had already exited
    AlreadyExited,
    /// The timeout elapsed and the process tree was killed
    TimedOut,
}

/// A running child attached to a pseudo-terminal
pub struct ChildProcessHost {
    process_id: Option<u32>,
    writer: Mutex<Box<dyn Write + Send>>,
    control: Mutex<Box<dyn PtyControl>>,
    signaller: Arc<dyn ProcessSignaller>,
    exit_rx: watch::Receiver<Option<i32>>,
    drain_rx: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl ChildProcessHost {
    /// Start `command` through `backend`, draining its output into `buffer`
    ///
    /// # Errors
    /// Returns `WorkingDirectoryNotFound` if the directory does not exist, or
    /// whatever the backend reports for a failed start
    pub fn spawn(
        backend: &dyn PtyBackend,
        command: &SpawnCommand,
        buffer: Arc<CircularByteBuffer>,
    ) -> Result<Self> {
        if !is_directory(&command.working_directory) {
            return Err(DirectorError::working_directory_not_found(
                &command.working_directory,
            ));
        }

        let spawned = backend.spawn(command)?;
        let mut child = spawned.child;
        let process_id = child.process_id();
        let signaller = child.signaller();
        let cancel = CancellationToken::new();

        let (drain_tx, drain_rx) = watch::channel(false);
        let drain_cancel = cancel.clone();
        let mut reader = spawned.reader;
        thread::Builder::new()
            .name("pty-drain".to_string())
            .spawn(move || {
                drain(&mut *reader, &buffer, &drain_cancel);
                let _ = drain_tx.send(true);
            })
            .map_err(|e| DirectorError::spawn(format!("Failed to start drain thread: {e}")))?;

        let (exit_tx, exit_rx) = watch::channel(None);
        thread::Builder::new()
            .name("pty-exit".to_string())
            .spawn(move || {
                let code = child.wait().unwrap_or_else(|e| {
                    log::warn!("Failed to collect exit status: {e}");
                    -1
                });
                let _ = exit_tx.send(Some(code));
            })
            .map_err(|e| DirectorError::spawn(format!("Failed to start exit watcher: {e}")))?;

        log::debug!(
            "Spawned {} in {} (pid {process_id:?})",
            command.program,
            command.working_directory.display()
        );

        Ok(Self {
            process_id,
            writer: Mutex::new(spawned.writer),
            control: Mutex::new(spawned.control),
            signaller,
            exit_rx,
            drain_rx,
            cancel,
        })
    }

    /// OS process id of the child
    #[must_use]
    pub const fn process_id(&self) -> Option<u32> {
        self.process_id
    }

    /// Exit code, once the child has exited
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        *self.exit_rx.borrow()
    }

    /// True once the child has exited
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exit_code().is_some()
    }

    /// Send bytes to the child's input
    ///
    /// Blocks only while the OS terminal buffer is full.
    ///
    /// # Errors
    /// Returns `Io` if the terminal is closed
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Propagate a new terminal size
    ///
    /// # Errors
    /// Returns `Pty` if the backend rejects the size
    pub fn resize(&self, size: TerminalSize) -> Result<()> {
        self.control.lock().resize(size)
    }

    /// Wait until the output stream has ended and return the exit code
    ///
    /// Normally the drain loop ends first. If the child exits while something
    /// else still holds the terminal open, the exit is reported after
    /// [`DRAIN_GRACE`].
    pub async fn wait_exit(&self) -> i32 {
        let mut drain = self.drain_rx.clone();
        let mut exit = self.exit_rx.clone();

        tokio::select! {
            _ = drain.wait_for(|done| *done) => {}
            () = async {
                let _ = exit.wait_for(Option::is_some).await;
                tokio::time::sleep(DRAIN_GRACE).await;
            } => {
                log::debug!("Child exited but output stream is still open; reporting exit");
            }
        }

        let mut exit = self.exit_rx.clone();
        match exit.wait_for(Option::is_some).await {
            Ok(code) => code.unwrap_or(-1),
            Err(_) => -1,
        }
    }

    /// Interrupt the child, wait up to `timeout`, then kill the process tree
    pub async fn request_graceful_shutdown(&self, timeout: Duration) -> ShutdownOutcome {
        if self.has_exited() {
            return ShutdownOutcome::AlreadyExited;
        }

        if let Err(e) = self.signaller.interrupt() {
            log::debug!("Interrupt signal unavailable ({e}); sending ETX");
            if let Err(e) = self.write(&[ETX]) {
                log::debug!("Failed to write ETX: {e}");
            }
        }

        let mut exit = self.exit_rx.clone();
        if tokio::time::timeout(timeout, exit.wait_for(Option::is_some))
            .await
            .is_ok()
        {
            return ShutdownOutcome::Graceful;
        }

        log::warn!(
            "Child {:?} did not exit within {timeout:?}; killing process tree",
            self.process_id
        );
        self.force_kill();
        ShutdownOutcome::TimedOut
    }

    /// Kill the process tree immediately
    pub fn force_kill(&self) {
        self.cancel.cancel();
        if let Err(e) = self.signaller.kill() {
            log::warn!("Failed to kill child {:?}: {e}", self.process_id);
        }
    }
}

impl Drop for ChildProcessHost {
    fn drop(&mut self) {
        self.cancel.cancel();
        if !self.has_exited() {
            let _ = self.signaller.kill();
        }
    }
}

impl std::fmt::Debug for ChildProcessHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildProcessHost")
            .field("process_id", &self.process_id)
            .field("exit_code", &self.exit_code())
            .finish_non_exhaustive()
    }
}

fn is_directory(path: &Path) -> bool {
    path.metadata().map(|m| m.is_dir()).unwrap_or(false)
}

fn drain(reader: &mut dyn Read, buffer: &CircularByteBuffer, cancel: &CancellationToken) {
    let mut chunk = vec![0u8; DRAIN_CHUNK_SIZE];
    loop {
        if cancel.is_cancelled() {
            break;
        }
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buffer.write(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            // EIO is how Linux reports a closed terminal
            Err(e) => {
                log::trace!("Drain loop ended: {e}");
                break;
            }
        }
    }
}
