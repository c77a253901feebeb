//! Error taxonomy for the proxy's external-facing failure modes.
//!
//! Per-connection and core component failures are plain `std::io::Error`
//! (core functions already return `io::Result`/`Option`, matching the
//! teacher's `Option`-returning `parse_request`/`extract_host`); this
//! enum only covers the handful of startup-time failures that need a
//! human-readable diagnostic and a process exit code.

use std::fmt;

#[derive(Debug)]
pub enum ProxyError {
    /// Missing, malformed, or out-of-range CLI arguments.
    CliUsage,
    /// The listen socket could not be opened.
    ListenSocket(std::io::Error),
    /// The initial (or a reconnect) connect to the upstream origin failed.
    UpstreamConnect(std::io::Error),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::CliUsage => write!(
                f,
                "usage: httpproxy <client-port> <server-port> [-u] [-c <N>] [-m <B>]"
            ),
            ProxyError::ListenSocket(e) => write!(f, "failed to open listen socket: {e}"),
            ProxyError::UpstreamConnect(e) => write!(f, "failed to connect to upstream: {e}"),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::CliUsage => None,
            ProxyError::ListenSocket(e) | ProxyError::UpstreamConnect(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_usage_message_is_stable() {
        assert_eq!(
            ProxyError::CliUsage.to_string(),
            "usage: httpproxy <client-port> <server-port> [-u] [-c <N>] [-m <B>]"
        );
    }

    #[test]
    fn wraps_io_errors_with_context() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "boom");
        let err = ProxyError::ListenSocket(io_err);
        assert!(err.to_string().contains("listen socket"));
        assert!(err.to_string().contains("boom"));
    }
}
