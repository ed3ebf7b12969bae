//! Control channel endpoint addressing

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{DirectorError, Result};

/// Loopback port used when no Unix socket is available
pub const DEFAULT_TCP_PORT: u16 = 47_391;

const TCP_SCHEME: &str = "tcp://";
const UNIX_SCHEME: &str = "unix://";

/// Where the control channel listens
///
/// Text form is `tcp://host:port` for TCP and a plain (or `unix://`) path
/// for a Unix domain socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEndpoint {
    /// Unix domain socket at a filesystem path
    #[cfg(unix)]
    Unix(PathBuf),
    /// Loopback TCP address
    Tcp(SocketAddr),
}

impl ControlEndpoint {
    /// Platform default: a socket in the runtime directory on Unix, loopback TCP elsewhere
    #[must_use]
    pub fn default_for_platform() -> Self {
        #[cfg(unix)]
        {
            Self::Unix(crate::types::options::default_runtime_dir().join("control.sock"))
        }
        #[cfg(not(unix))]
        {
            Self::Tcp(SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_TCP_PORT)))
        }
    }

    /// Loopback TCP endpoint on `port` (0 picks a free port at bind time)
    #[must_use]
    pub fn loopback(port: u16) -> Self {
        Self::Tcp(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    }
}

impl fmt::Display for ControlEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(unix)]
            Self::Unix(path) => write!(f, "{}", path.display()),
            Self::Tcp(addr) => write!(f, "{TCP_SCHEME}{addr}"),
        }
    }
}

impl FromStr for ControlEndpoint {
    type Err = DirectorError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DirectorError::invalid_config("Empty control endpoint"));
        }

        if let Some(addr) = s.strip_prefix(TCP_SCHEME) {
            return addr.parse::<SocketAddr>().map(Self::Tcp).map_err(|e| {
                DirectorError::invalid_config(format!("Invalid TCP endpoint {s:?}: {e}"))
            });
        }

        let path = s.strip_prefix(UNIX_SCHEME).unwrap_or(s);
        #[cfg(unix)]
        {
            Ok(Self::Unix(PathBuf::from(path)))
        }
        #[cfg(not(unix))]
        {
            Err(DirectorError::invalid_config(format!(
                "Unix socket endpoints are not supported on this platform: {path:?}"
            )))
        }
    }
}
