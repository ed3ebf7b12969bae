//! Control channel listener
//!
//! Each client connects, writes one JSON line and disconnects. Every
//! connection is handled on its own task with a bounded read timeout, so a
//! slow or silent client never holds up the accept loop.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::io::AsyncRead;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;

#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

use crate::error::{DirectorError, Result};

use super::endpoint::ControlEndpoint;
use super::diagnostics::DiagnosticLog;
use super::message::ControlMessage;

/// Longest accepted message line
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Receiver of decoded control messages
///
/// Called on the connection task; implementations must not block.
pub trait ControlHandler: Send + Sync {
    /// Handle one decoded message
    fn handle(&self, message: ControlMessage);
}

impl<F> ControlHandler for F
where
    F: Fn(ControlMessage) + Send + Sync,
{
    fn handle(&self, message: ControlMessage) {
        self(message);
    }
}

/// What happened to one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// A message was decoded and handed to the handler
    Dispatched,
    /// The client closed without sending a line
    Empty,
    /// The line was not a valid message
    Malformed(String),
    /// No line arrived within the read timeout
    TimedOut,
    /// Reading failed (oversized line, reset connection)
    ReadFailed(String),
}

struct ConnectionContext {
    handler: Arc<dyn ControlHandler>,
    diagnostics: Arc<DiagnosticLog>,
    read_timeout: Duration,
}

enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Listener {
    async fn accept(&self) -> io::Result<Connection> {
        match self {
            Self::Tcp(listener) => listener.accept().await.map(|(s, _)| Connection::Tcp(s)),
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept().await.map(|(s, _)| Connection::Unix(s)),
        }
    }
}

/// Local listener feeding control messages to a [`ControlHandler`]
pub struct ControlChannelServer {
    endpoint: ControlEndpoint,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ControlChannelServer {
    /// Bind `endpoint` and start accepting connections
    ///
    /// For TCP port 0 the returned server reports the port actually bound.
    /// A stale Unix socket file is replaced.
    ///
    /// # Errors
    /// Returns `Transport` if the endpoint cannot be bound
    pub async fn bind(
        endpoint: &ControlEndpoint,
        handler: Arc<dyn ControlHandler>,
        diagnostics: Arc<DiagnosticLog>,
        read_timeout: Duration,
    ) -> Result<Self> {
        let (listener, endpoint) = open_listener(endpoint).await?;
        let cancel = CancellationToken::new();
        let context = Arc::new(ConnectionContext {
            handler,
            diagnostics,
            read_timeout,
        });

        log::info!("Control channel listening on {endpoint}");
        let task = tokio::spawn(accept_loop(listener, context, cancel.clone()));

        Ok(Self {
            endpoint,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    /// Endpoint clients should connect to
    #[must_use]
    pub const fn endpoint(&self) -> &ControlEndpoint {
        &self.endpoint
    }

    /// True until `stop` is called
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stop accepting and remove the socket file
    pub async fn stop(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.remove_socket_file();
        log::info!("Control channel on {} stopped", self.endpoint);
    }

    fn remove_socket_file(&self) {
        #[cfg(unix)]
        if let ControlEndpoint::Unix(path) = &self.endpoint {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl Drop for ControlChannelServer {
    fn drop(&mut self) {
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
            self.remove_socket_file();
        }
    }
}

impl std::fmt::Debug for ControlChannelServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlChannelServer")
            .field("endpoint", &self.endpoint)
            .field("running", &self.is_running())
            .finish()
    }
}

async fn open_listener(endpoint: &ControlEndpoint) -> Result<(Listener, ControlEndpoint)> {
    match endpoint {
        ControlEndpoint::Tcp(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|e| DirectorError::transport(format!("Failed to bind {endpoint}: {e}")))?;
            let local = listener
                .local_addr()
                .map_err(|e| DirectorError::transport(format!("Failed to read bound address: {e}")))?;
            Ok((Listener::Tcp(listener), ControlEndpoint::Tcp(local)))
        }
        #[cfg(unix)]
        ControlEndpoint::Unix(path) => {
            let listener = bind_unix(path)
                .map_err(|e| DirectorError::transport(format!("Failed to bind {endpoint}: {e}")))?;
            Ok((Listener::Unix(listener), endpoint.clone()))
        }
    }
}

#[cfg(unix)]
fn bind_unix(path: &Path) -> io::Result<UnixListener> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
        let _ = fs::set_permissions(parent, fs::Permissions::from_mode(0o700));
    }
    if path.exists() {
        // A socket that still accepts belongs to a live listener
        if std::os::unix::net::UnixStream::connect(path).is_ok() {
            return Err(io::Error::new(io::ErrorKind::AddrInUse, "endpoint in use"));
        }
        log::debug!("Removing stale socket {}", path.display());
        fs::remove_file(path)?;
    }

    let listener = UnixListener::bind(path)?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(listener)
}

async fn accept_loop(
    listener: Listener,
    context: Arc<ConnectionContext>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(connection) => {
                    let context = Arc::clone(&context);
                    tokio::spawn(async move {
                        let outcome = match connection {
                            Connection::Tcp(stream) => handle_connection(stream, &context).await,
                            #[cfg(unix)]
                            Connection::Unix(stream) => handle_connection(stream, &context).await,
                        };
                        log_outcome(&outcome);
                    });
                }
                Err(e) => {
                    log::warn!("Control channel accept failed: {e}");
                    // Back off on persistent errors such as fd exhaustion
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }
}

/// Read one message from `stream`, record it and hand it to the handler
async fn handle_connection<S>(stream: S, context: &ConnectionContext) -> DeliveryOutcome
where
    S: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(stream, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

    let read = tokio::time::timeout(context.read_timeout, async {
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) if line.trim().is_empty() => {}
                Ok(line) => return Ok(Some(line)),
                Err(e) => return Err(e.to_string()),
            }
        }
        Ok(None)
    })
    .await;

    let line = match read {
        Err(_) => return DeliveryOutcome::TimedOut,
        Ok(Err(e)) => return DeliveryOutcome::ReadFailed(e),
        Ok(Ok(None)) => return DeliveryOutcome::Empty,
        Ok(Ok(Some(line))) => line,
    };

    match ControlMessage::parse(&line) {
        Ok(message) => {
            context.diagnostics.record(message.clone());
            context.handler.handle(message);
            DeliveryOutcome::Dispatched
        }
        Err(e) => DeliveryOutcome::Malformed(e.to_string()),
    }
}

fn log_outcome(outcome: &DeliveryOutcome) {
    match outcome {
        DeliveryOutcome::Dispatched => {}
        DeliveryOutcome::Empty => log::debug!("Control connection closed without a message"),
        DeliveryOutcome::Malformed(e) => log::warn!("Dropped malformed control message: {e}"),
        DeliveryOutcome::TimedOut => log::warn!("Control connection timed out before sending"),
        DeliveryOutcome::ReadFailed(e) => log::warn!("Control connection read failed: {e}"),
    }
}

