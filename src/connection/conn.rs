//! Core connection type

use super::config::ConnectConfig;
use super::state::ConnectionState;
use super::tls::TlsConfig;
use super::transport::Transport;
use crate::{metrics, Error, Result};
use bytes::BytesMut;
use tracing::Instrument;

/// A client connection to a MongoDB server.
///
/// Wraps either a plain TCP stream or a TLS session over TCP, chosen once at
/// [`open`](Connection::open) time by the configuration and fixed for the
/// lifetime of the value. All I/O takes `&mut self`; callers needing
/// concurrent connections open one per task.
///
/// The connection owns its socket exclusively. Dropping the value closes the
/// descriptor; [`close`](Connection::close) additionally sends the TLS
/// close_notify alert when applicable.
pub struct Connection {
    transport: Option<Transport>,
    state: ConnectionState,
    host: String,
    port: u16,
}

impl Connection {
    /// Open a connection per the given configuration.
    ///
    /// Establishes the TCP connection and, if `config.use_tls` is set, builds
    /// a TLS context for the configured verification policy and performs the
    /// handshake. On any failure every partially-acquired resource is
    /// released before the error propagates; a failed handshake never leaks
    /// the socket.
    ///
    /// # Errors
    ///
    /// [`Error::Resolution`], [`Error::ConnectionRefused`],
    /// [`Error::HostUnreachable`], [`Error::Timeout`] from the TCP stage;
    /// [`Error::TlsContext`], [`Error::Handshake`], [`Error::Certificate`]
    /// from the TLS stage. Use [`Error::is_transient`] to decide whether a
    /// retry at a higher layer makes sense.
    pub async fn open(config: &ConnectConfig) -> Result<Self> {
        let mode = if config.use_tls {
            metrics::labels::MODE_TLS
        } else {
            metrics::labels::MODE_PLAIN
        };

        let mut conn = Self {
            transport: None,
            state: ConnectionState::Unestablished,
            host: config.host.clone(),
            port: config.port,
        };

        metrics::counters::connect_attempted(mode);
        let start = std::time::Instant::now();

        let result = conn
            .establish(config)
            .instrument(tracing::info_span!(
                "open",
                host = %config.host,
                port = config.port,
                tls = config.use_tls
            ))
            .await;

        match result {
            Ok(()) => {
                metrics::counters::connect_established(mode);
                metrics::histograms::connect_duration(mode, start.elapsed().as_millis() as u64);
                Ok(conn)
            }
            Err(e) => {
                metrics::counters::connect_failed(mode, failure_reason(&e));
                conn.close().await;
                Err(e)
            }
        }
    }

    async fn establish(&mut self, config: &ConnectConfig) -> Result<()> {
        self.state.transition(ConnectionState::Connecting)?;
        let transport =
            Transport::connect(&config.host, config.port, config.connect_timeout).await?;

        let transport = if config.use_tls {
            self.state.transition(ConnectionState::HandshakingTls)?;

            let mut builder = TlsConfig::builder().verify_mode(config.verify_mode);
            if let Some(path) = &config.ca_bundle_path {
                builder = builder.ca_bundle_path(path.clone());
            }
            let tls_config = builder.build()?;

            transport
                .upgrade_to_tls(&tls_config, &config.host, config.connect_timeout)
                .await?
        } else {
            transport
        };

        self.transport = Some(transport);
        self.state.transition(ConnectionState::Established)?;
        tracing::info!("connection established");
        Ok(())
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the connection is ready for byte-stream I/O
    pub fn is_established(&self) -> bool {
        self.state == ConnectionState::Established
    }

    /// Whether the active transport carries TLS encryption
    pub fn is_tls(&self) -> bool {
        self.transport.as_ref().is_some_and(Transport::is_tls)
    }

    /// Remote host this connection was opened against
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Remote port this connection was opened against
    pub fn port(&self) -> u16 {
        self.port
    }

    fn transport_mut(&mut self) -> Result<&mut Transport> {
        match self.state {
            ConnectionState::Established => Ok(self
                .transport
                .as_mut()
                .expect("established connection missing transport")),
            ConnectionState::Closed => Err(Error::Closed),
            other => Err(Error::InvalidState {
                expected: "established".into(),
                actual: other.to_string(),
            }),
        }
    }

    /// Read into a byte slice.
    ///
    /// Returns 0 to signal a clean peer-initiated close. A TLS alert arriving
    /// mid-stream surfaces as [`Error::Handshake`], distinct from a plain
    /// [`Error::Io`].
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.transport_mut()?.read(buf).await
    }

    /// Read into a growable buffer; returns 0 on clean peer close
    pub async fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize> {
        self.transport_mut()?.read_buf(buf).await
    }

    /// Write from a byte slice.
    ///
    /// May write fewer bytes than requested; callers that need the whole
    /// buffer on the wire should loop or use
    /// [`write_all`](Connection::write_all).
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.transport_mut()?.write(buf).await
    }

    /// Write all bytes to the connection
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.transport_mut()?.write_all(buf).await
    }

    /// Flush buffered writes to the wire
    pub async fn flush(&mut self) -> Result<()> {
        self.transport_mut()?.flush().await
    }

    /// Close the connection.
    ///
    /// Valid from any state and idempotent: the second and later calls are
    /// no-ops. For TLS connections the close_notify alert is sent
    /// best-effort; a failure to send it is logged and otherwise ignored.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        // close is valid from any state
        self.state = ConnectionState::Closed;

        if let Some(mut transport) = self.transport.take() {
            let mode = if transport.is_tls() {
                metrics::labels::MODE_TLS
            } else {
                metrics::labels::MODE_PLAIN
            };
            if let Err(e) = transport.shutdown().await {
                tracing::warn!(error = %e, "error during connection shutdown");
            }
            metrics::counters::connection_closed(mode);
            tracing::debug!(host = %self.host, port = self.port, "connection closed");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("state", &self.state)
            .field("transport", &self.transport)
            .finish()
    }
}

/// Static label for the failure counter
fn failure_reason(e: &Error) -> &'static str {
    match e {
        Error::Resolution(_) => "resolution",
        Error::ConnectionRefused { .. } => "refused",
        Error::HostUnreachable { .. } => "unreachable",
        Error::Timeout(_) => "timeout",
        Error::Certificate(_) => "certificate",
        Error::Handshake(_) => "handshake",
        Error::TlsContext(_) => "tls_context",
        Error::Config(_) => "config",
        _ => "io",
    }
}
