//! Hook-side delivery of one control message
//!
//! The relay runs inside the hosted CLI's hook. It must never block or fail
//! the CLI, so every problem is reported as a [`RelayOutcome`] instead of an
//! error.

use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use super::endpoint::ControlEndpoint;
use super::message::HookMessage;

/// Default bound on a whole delivery
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of a delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The line was written and the connection closed
    Delivered,
    /// Nothing is listening at the endpoint, or the write failed
    Unreachable(String),
    /// Connecting or writing took longer than the timeout
    TimedOut,
    /// The payload is not a hook message
    InvalidPayload(String),
}

impl RelayOutcome {
    /// True if the message reached the server
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Re-encode raw hook JSON as a single compact line
///
/// Fields other than the known ones are dropped; the server ignores them anyway.
///
/// # Errors
/// Returns the decode error text if `raw` is not a hook message
pub fn encode_line(raw: &str) -> std::result::Result<String, String> {
    let message: HookMessage = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let mut line = serde_json::to_string(&message).map_err(|e| e.to_string())?;
    line.push('\n');
    Ok(line)
}

/// Send one raw hook payload to `endpoint`
pub async fn deliver(endpoint: &ControlEndpoint, payload: &str, timeout: Duration) -> RelayOutcome {
    let line = match encode_line(payload) {
        Ok(line) => line,
        Err(e) => return RelayOutcome::InvalidPayload(e),
    };

    match tokio::time::timeout(timeout, send_line(endpoint, line.as_bytes())).await {
        Ok(Ok(())) => RelayOutcome::Delivered,
        Ok(Err(e)) => RelayOutcome::Unreachable(e.to_string()),
        Err(_) => RelayOutcome::TimedOut,
    }
}

async fn send_line(endpoint: &ControlEndpoint, line: &[u8]) -> std::io::Result<()> {
    match endpoint {
        ControlEndpoint::Tcp(addr) => write_and_close(TcpStream::connect(addr).await?, line).await,
        #[cfg(unix)]
        ControlEndpoint::Unix(path) => write_and_close(UnixStream::connect(path).await?, line).await,
    }
}

async fn write_and_close<S>(mut stream: S, line: &[u8]) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(line).await?;
    stream.flush().await?;
    stream.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_line_compacts_and_terminates() {
        let line = encode_line("{\n  \"hook_event_name\": \"Stop\",\n  \"session_id\": \"s1\"\n}").unwrap();
        assert_eq!(line, "{\"hook_event_name\":\"Stop\",\"session_id\":\"s1\"}\n");
    }

    #[tokio::test]
    async fn invalid_payload_is_an_outcome() {
        let outcome = deliver(&ControlEndpoint::loopback(1), "not json", DEFAULT_RELAY_TIMEOUT).await;
        assert!(matches!(outcome, RelayOutcome::InvalidPayload(_)));
    }
}
