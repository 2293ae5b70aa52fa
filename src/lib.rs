//! Plain TCP and TLS socket transport for MongoDB client connections.
//!
//! This crate provides the connection layer a MongoDB wire-protocol client
//! sits on top of: establishing a TCP connection, optionally upgrading it to
//! TLS with a configurable certificate verification policy, and exposing one
//! byte-stream interface regardless of transport mode.
//!
//! The wire protocol itself, connection pooling, and retry policy belong to
//! higher layers. This crate only guarantees the read/write/close contract.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> mongo_socket::Result<()> {
//! use mongo_socket::{ConnectConfig, Connection};
//!
//! let config = ConnectConfig::builder("db.example.com", 27017)
//!     .use_tls(true)
//!     .build();
//!
//! let mut conn = Connection::open(&config).await?;
//! conn.write_all(b"\x10\x00\x00\x00...").await?;
//!
//! let mut buf = [0u8; 4096];
//! let n = conn.read(&mut buf).await?;
//! conn.close().await;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

pub mod connection;
pub mod metrics;

pub use connection::{
    ConnectConfig, ConnectConfigBuilder, Connection, ConnectionState, TlsConfig, VerifyMode,
};

/// Crate-wide error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Hostname could not be resolved to an address
    #[error("failed to resolve host '{0}'")]
    Resolution(String),

    /// The remote host actively refused the connection
    #[error("connection refused by {host}:{port}")]
    ConnectionRefused {
        /// Remote host
        host: String,
        /// Remote port
        port: u16,
    },

    /// No route to the remote host
    #[error("host unreachable: {host}:{port}")]
    HostUnreachable {
        /// Remote host
        host: String,
        /// Remote port
        port: u16,
    },

    /// An operation did not complete in time.
    ///
    /// Carries the caller-supplied deadline when one was configured; `None`
    /// means the OS reported the timeout on its own.
    #[error("operation timed out{}", .0.map(|d| format!(" after {d:?}")).unwrap_or_default())]
    Timeout(Option<Duration>),

    /// Transport-level I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection while a write was in flight
    #[error("broken pipe: peer closed the connection")]
    BrokenPipe,

    /// The connection has been closed locally
    #[error("connection is closed")]
    Closed,

    /// Operation invoked in a state that does not permit it
    #[error("invalid connection state: expected {expected}, found {actual}")]
    InvalidState {
        /// State the operation requires
        expected: String,
        /// State the connection was in
        actual: String,
    },

    /// TLS handshake or TLS protocol failure
    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    /// Peer certificate failed verification
    #[error("certificate verification failed: {0}")]
    Certificate(String),

    /// The TLS client context could not be built
    #[error("failed to create TLS context: {0}")]
    TlsContext(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether a retry at a higher layer could plausibly succeed.
    ///
    /// Transient errors (timeouts, refused connections, transport hiccups)
    /// are worth retrying; certificate and configuration failures are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ConnectionRefused { .. }
                | Error::HostUnreachable { .. }
                | Error::Timeout(_)
                | Error::Io(_)
                | Error::BrokenPipe
        )
    }
}

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Timeout(Some(Duration::from_secs(1))).is_transient());
        assert!(Error::Timeout(None).is_transient());
        assert!(Error::ConnectionRefused {
            host: "localhost".into(),
            port: 27017,
        }
        .is_transient());
        assert!(Error::BrokenPipe.is_transient());

        assert!(!Error::Certificate("expired".into()).is_transient());
        assert!(!Error::Handshake("protocol mismatch".into()).is_transient());
        assert!(!Error::Closed.is_transient());
        assert!(!Error::Config("bad port".into()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = Error::ConnectionRefused {
            host: "127.0.0.1".into(),
            port: 9999,
        };
        assert_eq!(err.to_string(), "connection refused by 127.0.0.1:9999");

        let err = Error::InvalidState {
            expected: "established".into(),
            actual: "closed".into(),
        };
        assert!(err.to_string().contains("expected established"));
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::Timeout(Some(Duration::from_secs(5)));
        assert_eq!(err.to_string(), "operation timed out after 5s");

        // OS-reported timeout has no configured deadline to report
        let err = Error::Timeout(None);
        assert_eq!(err.to_string(), "operation timed out");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_transient());
    }
}
