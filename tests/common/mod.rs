//! Shared test helpers: a scripted in-memory pty backend and polling utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use kodegen_claude_director::pty::{
    ChildHandle, ProcessSignaller, PtyBackend, PtyControl, SpawnCommand, SpawnedProcess,
    TerminalSize,
};
use kodegen_claude_director::{DirectorError, EngineOptions, Result};
use parking_lot::{Condvar, Mutex};

/// Exit code reported after an honoured interrupt
pub const INTERRUPTED_EXIT: i32 = 130;
/// Exit code reported after a kill
pub const KILLED_EXIT: i32 = 137;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Options suitable for tests: no persistence, loopback control channel, short timeouts
pub fn test_options() -> EngineOptions {
    EngineOptions::builder()
        .executable("fake-claude")
        .endpoint(kodegen_claude_director::ControlEndpoint::loopback(0))
        .state_file(None)
        .shutdown_timeout(Duration::from_millis(300))
        .read_timeout(Duration::from_millis(500))
        .buffer_capacity(64 * 1024)
        .build()
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[derive(Default)]
struct ProcessState {
    output: VecDeque<u8>,
    input: Vec<u8>,
    closed: bool,
    exit_code: Option<i32>,
    interrupts: usize,
    size: Option<TerminalSize>,
}

struct Shared {
    state: Mutex<ProcessState>,
    changed: Condvar,
    ignore_interrupt: bool,
}

impl Shared {
    fn exit(&self, code: i32) {
        let mut state = self.state.lock();
        if state.exit_code.is_none() {
            state.exit_code = Some(code);
        }
        state.closed = true;
        self.changed.notify_all();
    }
}

/// Test-side handle to one scripted process
#[derive(Clone)]
pub struct FakeProcess {
    pid: u32,
    command: SpawnCommand,
    shared: Arc<Shared>,
}

impl FakeProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn command(&self) -> &SpawnCommand {
        &self.command
    }

    /// Make the process print `bytes`
    pub fn emit(&self, bytes: &[u8]) {
        let mut state = self.shared.state.lock();
        state.output.extend(bytes);
        self.shared.changed.notify_all();
    }

    /// Make the process exit; its terminal closes at the same time
    pub fn exit(&self, code: i32) {
        self.shared.exit(code);
    }

    /// Everything written to the process so far
    pub fn input(&self) -> Vec<u8> {
        self.shared.state.lock().input.clone()
    }

    pub fn interrupts(&self) -> usize {
        self.shared.state.lock().interrupts
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.shared.state.lock().exit_code
    }

    pub fn size(&self) -> Option<TerminalSize> {
        self.shared.state.lock().size
    }
}

/// In-memory [`PtyBackend`] whose processes are driven by the test
#[derive(Default)]
pub struct FakePtyBackend {
    processes: Mutex<Vec<FakeProcess>>,
    next_pid: AtomicU32,
    ignore_interrupt: AtomicBool,
    missing_executable: AtomicBool,
}

impl FakePtyBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_pid: AtomicU32::new(40_000),
            ..Self::default()
        })
    }

    /// Processes spawned from now on ignore interrupts
    pub fn ignore_interrupts(&self) {
        self.ignore_interrupt.store(true, Ordering::SeqCst);
    }

    /// Every spawn fails as if the executable were not installed
    pub fn missing_executable(&self) {
        self.missing_executable.store(true, Ordering::SeqCst);
    }

    pub fn processes(&self) -> Vec<FakeProcess> {
        self.processes.lock().clone()
    }

    pub fn last(&self) -> FakeProcess {
        self.processes
            .lock()
            .last()
            .cloned()
            .expect("no process spawned")
    }
}

impl PtyBackend for FakePtyBackend {
    fn spawn(&self, command: &SpawnCommand) -> Result<SpawnedProcess> {
        if self.missing_executable.load(Ordering::SeqCst) {
            return Err(DirectorError::executable_not_found(&command.program));
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(ProcessState {
                size: Some(command.size),
                ..ProcessState::default()
            }),
            changed: Condvar::new(),
            ignore_interrupt: self.ignore_interrupt.load(Ordering::SeqCst),
        });
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.processes.lock().push(FakeProcess {
            pid,
            command: command.clone(),
            shared: Arc::clone(&shared),
        });

        Ok(SpawnedProcess {
            reader: Box::new(FakeReader(Arc::clone(&shared))),
            writer: Box::new(FakeWriter(Arc::clone(&shared))),
            control: Box::new(FakeControl(Arc::clone(&shared))),
            child: Box::new(FakeChild { pid, shared }),
        })
    }
}

struct FakeReader(Arc<Shared>);

impl Read for FakeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.0.state.lock();
        while state.output.is_empty() && !state.closed {
            self.0.changed.wait(&mut state);
        }
        let n = buf.len().min(state.output.len());
        for (slot, byte) in buf.iter_mut().zip(state.output.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

struct FakeWriter(Arc<Shared>);

impl Write for FakeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.0.state.lock();
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal closed"));
        }
        state.input.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct FakeControl(Arc<Shared>);

impl PtyControl for FakeControl {
    fn resize(&self, size: TerminalSize) -> Result<()> {
        self.0.state.lock().size = Some(size);
        Ok(())
    }
}

struct FakeChild {
    pid: u32,
    shared: Arc<Shared>,
}

impl ChildHandle for FakeChild {
    fn process_id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn signaller(&self) -> Arc<dyn ProcessSignaller> {
        Arc::new(FakeSignaller(Arc::clone(&self.shared)))
    }

    fn wait(&mut self) -> Result<i32> {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(code) = state.exit_code {
                return Ok(code);
            }
            self.shared.changed.wait(&mut state);
        }
    }
}

struct FakeSignaller(Arc<Shared>);

impl ProcessSignaller for FakeSignaller {
    fn interrupt(&self) -> Result<()> {
        let ignore = {
            let mut state = self.0.state.lock();
            state.interrupts += 1;
            self.0.ignore_interrupt
        };
        if !ignore {
            self.0.exit(INTERRUPTED_EXIT);
        }
        Ok(())
    }

    fn kill(&self) -> Result<()> {
        self.0.exit(KILLED_EXIT);
        Ok(())
    }
}
