//! Transport abstraction (plain TCP vs TLS-encrypted TCP)

use super::tls::{parse_server_name, TlsConfig};
use crate::{Error, Result};
use bytes::BytesMut;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Transport variant: plain or TLS-encrypted TCP
#[allow(clippy::large_enum_variant)]
pub enum Transport {
    /// Plain TCP connection
    Plain(TcpStream),
    /// TLS-encrypted TCP connection
    Tls(tokio_rustls::client::TlsStream<TcpStream>),
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Plain(_) => f.write_str("Transport::Plain(TcpStream)"),
            Transport::Tls(_) => f.write_str("Transport::Tls(TlsStream)"),
        }
    }
}

/// Run `fut` under an optional deadline, surfacing `Error::Timeout` on expiry.
///
/// On expiry the future is dropped, which closes any socket it owned.
async fn with_deadline<F, T>(deadline: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| Error::Timeout(Some(d)))?,
        None => fut.await,
    }
}

/// Classify a TCP connect failure into the connection error taxonomy.
fn classify_connect_error(e: std::io::Error, host: &str, port: u16) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => Error::ConnectionRefused {
            host: host.to_string(),
            port,
        },
        std::io::ErrorKind::HostUnreachable | std::io::ErrorKind::NetworkUnreachable => {
            Error::HostUnreachable {
                host: host.to_string(),
                port,
            }
        }
        // OS-level connect timeout, hit without a caller-supplied deadline
        std::io::ErrorKind::TimedOut => Error::Timeout(None),
        _ => Error::Io(e),
    }
}

/// Classify an I/O failure during the TLS handshake.
///
/// tokio-rustls surfaces TLS-level failures as `io::Error` wrapping a
/// `rustls::Error`. Certificate rejections get their own variant so callers
/// can tell a fatal trust problem from a transient transport problem.
fn classify_handshake_error(e: std::io::Error) -> Error {
    if let Some(inner) = e.get_ref() {
        if let Some(tls_err) = inner.downcast_ref::<rustls::Error>() {
            if let rustls::Error::InvalidCertificate(reason) = tls_err {
                return Error::Certificate(format!("{:?}", reason));
            }
            return Error::Handshake(tls_err.to_string());
        }
    }
    Error::Io(e)
}

/// Classify an I/O failure on an established stream.
///
/// A TLS alert arriving mid-stream surfaces as a handshake-level error,
/// distinct from a plain transport failure.
fn classify_stream_error(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::BrokenPipe {
        return Error::BrokenPipe;
    }
    if let Some(inner) = e.get_ref() {
        if let Some(tls_err) = inner.downcast_ref::<rustls::Error>() {
            if let rustls::Error::InvalidCertificate(reason) = tls_err {
                return Error::Certificate(format!("{:?}", reason));
            }
            return Error::Handshake(tls_err.to_string());
        }
    }
    Error::Io(e)
}

impl Transport {
    /// Connect via plain TCP.
    ///
    /// Resolution failures surface as [`Error::Resolution`]; connect failures
    /// are classified into refused / unreachable / timeout. When `timeout` is
    /// set the whole resolve-and-connect sequence is deadline-bounded.
    pub async fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<Self> {
        with_deadline(timeout, async {
            let addrs = tokio::net::lookup_host((host, port))
                .await
                .map_err(|_| Error::Resolution(host.to_string()))?;

            // A host may resolve to several addresses (e.g. ::1 and
            // 127.0.0.1 for localhost); try each in order and keep the
            // classified error of the last failure.
            let mut last_err = None;
            for addr in addrs {
                match TcpStream::connect(addr).await {
                    Ok(stream) => {
                        tracing::debug!(%host, port, %addr, "TCP connection established");
                        return Ok(Transport::Plain(stream));
                    }
                    Err(e) => last_err = Some(classify_connect_error(e, host, port)),
                }
            }

            Err(last_err.unwrap_or_else(|| Error::Resolution(host.to_string())))
        })
        .await
    }

    /// Upgrade a plain TCP transport to TLS.
    ///
    /// Consumes `self` and returns a new `Transport` with an encrypted
    /// stream. On any failure (including a timeout) the underlying socket is
    /// closed before the error is returned, so a failed handshake never
    /// leaks a descriptor. Returns an error if the transport is already TLS.
    pub async fn upgrade_to_tls(
        self,
        tls_config: &TlsConfig,
        hostname: &str,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        match self {
            Transport::Plain(tcp_stream) => {
                let server_name = parse_server_name(hostname)?;
                let server_name = rustls_pki_types::ServerName::try_from(server_name)
                    .map_err(|_| Error::Config(format!("invalid hostname for TLS: {}", hostname)))?;

                let client_config = tls_config.client_config();
                let tls_connector = tokio_rustls::TlsConnector::from(client_config);

                let tls_stream = with_deadline(timeout, async {
                    tls_connector
                        .connect(server_name, tcp_stream)
                        .await
                        .map_err(classify_handshake_error)
                })
                .await?;

                tracing::info!(%hostname, "TLS session established");
                Ok(Transport::Tls(tls_stream))
            }
            Transport::Tls(_) => Err(Error::Handshake(
                "transport is already TLS-encrypted".into(),
            )),
        }
    }

    /// Whether this transport carries TLS encryption
    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }

    /// Read into a byte slice; returns 0 on clean peer close
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = match self {
            Transport::Plain(stream) => stream.read(buf).await,
            Transport::Tls(stream) => stream.read(buf).await,
        };
        n.map_err(classify_stream_error)
    }

    /// Read into buffer; returns 0 on clean peer close
    pub async fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let n = match self {
            Transport::Plain(stream) => stream.read_buf(buf).await,
            Transport::Tls(stream) => stream.read_buf(buf).await,
        };
        n.map_err(classify_stream_error)
    }

    /// Write from a byte slice; may write fewer bytes than requested
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = match self {
            Transport::Plain(stream) => stream.write(buf).await,
            Transport::Tls(stream) => stream.write(buf).await,
        };
        n.map_err(classify_stream_error)
    }

    /// Write all bytes to the stream
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let result = match self {
            Transport::Plain(stream) => stream.write_all(buf).await,
            Transport::Tls(stream) => stream.write_all(buf).await,
        };
        result.map_err(classify_stream_error)
    }

    /// Flush the stream
    pub async fn flush(&mut self) -> Result<()> {
        let result = match self {
            Transport::Plain(stream) => stream.flush().await,
            Transport::Tls(stream) => stream.flush().await,
        };
        result.map_err(classify_stream_error)
    }

    /// Shutdown the stream.
    ///
    /// For TLS transports this sends the close_notify alert before closing
    /// the underlying socket.
    pub async fn shutdown(&mut self) -> Result<()> {
        let result = match self {
            Transport::Plain(stream) => stream.shutdown().await,
            Transport::Tls(stream) => stream.shutdown().await,
        };
        result.map_err(classify_stream_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused() {
        // Port 1 on loopback should have nothing listening
        let result = Transport::connect("127.0.0.1", 1, None).await;
        match result {
            Err(Error::ConnectionRefused { host, port }) => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 1);
            }
            other => panic!("expected ConnectionRefused, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_connect_resolution_failure() {
        let result = Transport::connect("host.that-does-not-exist.invalid", 27017, None).await;
        assert!(matches!(result, Err(Error::Resolution(_))));
    }

    #[tokio::test]
    async fn test_connect_and_roundtrip() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            socket.read_exact(&mut buf).await.unwrap();
            socket.write_all(&buf).await.unwrap();
        });

        let mut transport = Transport::connect("127.0.0.1", addr.port(), None)
            .await
            .unwrap();
        assert!(!transport.is_tls());

        transport.write_all(b"hello").await.unwrap();
        transport.flush().await.unwrap();

        let mut buf = BytesMut::with_capacity(64);
        let mut received = Vec::new();
        while received.len() < 5 {
            let n = transport.read_buf(&mut buf).await.unwrap();
            assert!(n > 0, "peer closed before echo completed");
            received.extend_from_slice(&buf.split());
        }
        assert_eq!(&received, b"hello");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_returns_zero_on_peer_close() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut transport = Transport::connect("127.0.0.1", addr.port(), None)
            .await
            .unwrap();
        server.await.unwrap();

        let mut buf = [0u8; 16];
        let n = transport.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_classify_connect_error() {
        let refused = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert!(matches!(
            classify_connect_error(refused, "h", 1),
            Error::ConnectionRefused { .. }
        ));

        let unreachable = std::io::Error::from(std::io::ErrorKind::HostUnreachable);
        assert!(matches!(
            classify_connect_error(unreachable, "h", 1),
            Error::HostUnreachable { .. }
        ));

        let timed_out = std::io::Error::from(std::io::ErrorKind::TimedOut);
        assert!(matches!(
            classify_connect_error(timed_out, "h", 1),
            Error::Timeout(None)
        ));

        let other = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(classify_connect_error(other, "h", 1), Error::Io(_)));
    }

    #[test]
    fn test_classify_stream_error() {
        let pipe = std::io::Error::from(std::io::ErrorKind::BrokenPipe);
        assert!(matches!(classify_stream_error(pipe), Error::BrokenPipe));

        let tls_alert = std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            rustls::Error::AlertReceived(rustls::AlertDescription::HandshakeFailure),
        );
        assert!(matches!(classify_stream_error(tls_alert), Error::Handshake(_)));

        let cert = std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            rustls::Error::InvalidCertificate(rustls::CertificateError::Expired),
        );
        assert!(matches!(classify_stream_error(cert), Error::Certificate(_)));

        let other = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        assert!(matches!(classify_stream_error(other), Error::Io(_)));
    }

    #[test]
    fn test_classify_handshake_error_plain_io() {
        let eof = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert!(matches!(classify_handshake_error(eof), Error::Io(_)));
    }
}
