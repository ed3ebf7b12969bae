//! Native pseudo-terminal backend built on `portable-pty`
//!
//! Unix children are session leaders on their own terminal, so the process
//! group id equals the child pid and signals go to the whole group. Windows
//! (ConPTY) has no interrupt signal; the host falls back to writing ETX.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};

use crate::error::{DirectorError, Result};

use super::{
    ChildHandle, ProcessSignaller, PtyBackend, PtyControl, SpawnCommand, SpawnedProcess,
    TerminalSize,
};

/// `portable-pty` backed terminal for the host platform
#[derive(Debug, Default, Clone, Copy)]
pub struct NativePtyBackend;

impl NativePtyBackend {
    /// Create the backend
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Resolve a program name or path to an executable file
///
/// # Errors
/// Returns `ExecutableNotFound` if nothing on `PATH` (or at the given path) matches
pub fn resolve_executable(program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|_| DirectorError::executable_not_found(program))
}

impl From<TerminalSize> for PtySize {
    fn from(size: TerminalSize) -> Self {
        Self {
            rows: size.rows,
            cols: size.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

impl PtyBackend for NativePtyBackend {
    fn spawn(&self, command: &SpawnCommand) -> Result<SpawnedProcess> {
        let program = resolve_executable(&command.program)?;

        let pair = native_pty_system()
            .openpty(command.size.into())
            .map_err(|e| DirectorError::spawn(format!("Failed to open PTY: {e}")))?;

        let mut cmd = CommandBuilder::new(&program);
        cmd.args(&command.args);
        cmd.cwd(&command.working_directory);
        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        let child = pair.slave.spawn_command(cmd).map_err(|e| {
            DirectorError::spawn(format!("Failed to start {}: {e}", program.display()))
        })?;
        // The master only sees EOF once every slave handle is closed
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| DirectorError::spawn(format!("Failed to clone PTY reader: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| DirectorError::spawn(format!("Failed to get PTY writer: {e}")))?;

        Ok(SpawnedProcess {
            reader,
            writer,
            control: Box::new(NativeControl {
                master: pair.master,
            }),
            child: Box::new(NativeChild { child }),
        })
    }
}

struct NativeControl {
    master: Box<dyn MasterPty + Send>,
}

impl PtyControl for NativeControl {
    fn resize(&self, size: TerminalSize) -> Result<()> {
        self.master
            .resize(size.into())
            .map_err(|e| DirectorError::pty(format!("Failed to resize PTY: {e}")))
    }
}

struct NativeChild {
    child: Box<dyn Child + Send + Sync>,
}

impl ChildHandle for NativeChild {
    fn process_id(&self) -> Option<u32> {
        self.child.process_id()
    }

    fn signaller(&self) -> Arc<dyn ProcessSignaller> {
        Arc::new(NativeSignaller {
            pid: self.child.process_id(),
            killer: Mutex::new(self.child.clone_killer()),
        })
    }

    fn wait(&mut self) -> Result<i32> {
        let status = self.child.wait()?;
        Ok(i32::try_from(status.exit_code()).unwrap_or(i32::MAX))
    }
}

struct NativeSignaller {
    #[cfg_attr(not(unix), allow(dead_code))]
    pid: Option<u32>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
}

#[cfg(unix)]
impl NativeSignaller {
    fn signal_group(&self, signal: nix::sys::signal::Signal) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let pid = self
            .pid
            .ok_or_else(|| DirectorError::pty("Child has no process id"))?;
        let pgid = i32::try_from(pid).map_err(|_| DirectorError::pty("Process id out of range"))?;
        // Negative pid addresses the process group
        match kill(Pid::from_raw(-pgid), signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(DirectorError::pty(format!("Failed to send {signal}: {e}"))),
        }
    }
}

#[cfg(unix)]
impl ProcessSignaller for NativeSignaller {
    fn interrupt(&self) -> Result<()> {
        self.signal_group(nix::sys::signal::Signal::SIGINT)
    }

    fn kill(&self) -> Result<()> {
        let group = self.signal_group(nix::sys::signal::Signal::SIGKILL);
        let _ = self.killer.lock().kill();
        group
    }
}

#[cfg(not(unix))]
impl ProcessSignaller for NativeSignaller {
    fn interrupt(&self) -> Result<()> {
        Err(DirectorError::pty("Interrupt signal not supported on this platform"))
    }

    fn kill(&self) -> Result<()> {
        self.killer.lock().kill()?;
        Ok(())
    }
}
