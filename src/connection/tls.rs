//! TLS configuration and support for secure connections to MongoDB.
//!
//! This module provides TLS configuration for connecting to remote MongoDB
//! servers. TLS is recommended for all non-local connections to prevent
//! credential interception.

use crate::{Error, Result};
use rustls::ClientConfig;
use rustls::RootCertStore;
use rustls_pemfile::Item;
use std::fs;
use std::sync::{Arc, Once};

static TLS_INIT: Once = Once::new();

/// Install the process-wide rustls cryptographic provider.
///
/// Idempotent: only the first call does any work. `TlsConfigBuilder::build`
/// invokes this itself, so a TLS context can never observe an uninitialized
/// library, but applications are encouraged to call it once at startup.
pub fn initialize() {
    TLS_INIT.call_once(|| {
        if rustls::crypto::aws_lc_rs::default_provider()
            .install_default()
            .is_err()
        {
            // Another component of the process installed a provider first.
            tracing::debug!("rustls crypto provider was already installed");
        }
    });
}

/// Certificate verification policy for TLS connections.
///
/// Controls whether the server's certificate chain and hostname are validated
/// during the handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerifyMode {
    /// Accept any certificate the server presents.
    ///
    /// The stream is still encrypted, but the connection is vulnerable to
    /// man-in-the-middle attacks. Only use for testing against servers with
    /// self-signed certificates.
    None,
    /// Server certificate must chain to a trusted CA and match the hostname
    #[default]
    Peer,
}

impl VerifyMode {
    /// Whether this mode validates the peer's certificate
    pub fn requires_verification(&self) -> bool {
        matches!(self, Self::Peer)
    }
}

impl std::fmt::Display for VerifyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Peer => write!(f, "peer"),
        }
    }
}

impl std::str::FromStr for VerifyMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "peer" => Ok(Self::Peer),
            _ => Err(Error::Config(format!(
                "invalid verify mode '{}': expected none or peer",
                s
            ))),
        }
    }
}

/// TLS configuration for secure MongoDB connections.
///
/// Wraps a compiled rustls [`ClientConfig`]. Cheap to clone; a configuration
/// built once can be reused across any number of connections that share the
/// same verification policy.
///
/// # Examples
///
/// ```ignore
/// use mongo_socket::connection::{TlsConfig, VerifyMode};
///
/// // With system root certificates (production)
/// let tls = TlsConfig::builder().build()?;
///
/// // With a custom CA bundle
/// let tls = TlsConfig::builder()
///     .ca_bundle_path("/path/to/ca.pem")
///     .build()?;
///
/// // For development against self-signed certificates
/// let tls = TlsConfig::builder()
///     .verify_mode(VerifyMode::None)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    /// Path to CA bundle file (None = use system roots)
    ca_bundle_path: Option<String>,
    /// Certificate verification policy
    verify_mode: VerifyMode,
    /// Compiled rustls ClientConfig
    client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Create a new TLS configuration builder.
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Get the rustls ClientConfig for this TLS configuration.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }

    /// The certificate verification policy in effect.
    pub fn verify_mode(&self) -> VerifyMode {
        self.verify_mode
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("ca_bundle_path", &self.ca_bundle_path)
            .field("verify_mode", &self.verify_mode)
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builder for TLS configuration.
pub struct TlsConfigBuilder {
    ca_bundle_path: Option<String>,
    verify_mode: VerifyMode,
    use_webpki_roots: bool,
}

impl Default for TlsConfigBuilder {
    fn default() -> Self {
        Self {
            ca_bundle_path: None,
            verify_mode: VerifyMode::Peer,
            use_webpki_roots: false,
        }
    }
}

impl TlsConfigBuilder {
    /// Set the path to a custom CA bundle file (PEM format).
    ///
    /// If not set, system root certificates are used.
    pub fn ca_bundle_path(mut self, path: impl Into<String>) -> Self {
        self.ca_bundle_path = Some(path.into());
        self
    }

    /// Set the certificate verification policy (default: [`VerifyMode::Peer`]).
    pub fn verify_mode(mut self, mode: VerifyMode) -> Self {
        self.verify_mode = mode;
        self
    }

    /// Use the bundled Mozilla root certificates instead of the system store.
    ///
    /// Useful in containers that ship without a CA directory. Ignored when a
    /// custom CA bundle path is set.
    pub fn with_webpki_roots(mut self) -> Self {
        self.use_webpki_roots = true;
        self
    }

    /// Build the TLS configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TlsContext`] if:
    /// - the CA bundle file cannot be read
    /// - the CA bundle contains no valid certificates
    /// - no system root certificates can be loaded
    pub fn build(self) -> Result<TlsConfig> {
        initialize();

        let client_config = if self.verify_mode.requires_verification() {
            let root_store = if let Some(ca_path) = &self.ca_bundle_path {
                self.load_custom_ca(ca_path)?
            } else if self.use_webpki_roots {
                let mut store = RootCertStore::empty();
                store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                store
            } else {
                let result = rustls_native_certs::load_native_certs();

                let mut store = RootCertStore::empty();
                for cert in result.certs {
                    let _ = store.add_parsable_certificates(std::iter::once(cert));
                }

                if store.is_empty() {
                    return Err(Error::TlsContext(
                        "failed to load any system root certificates".to_string(),
                    ));
                }

                store
            };

            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        } else {
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth()
        };

        Ok(TlsConfig {
            ca_bundle_path: self.ca_bundle_path,
            verify_mode: self.verify_mode,
            client_config: Arc::new(client_config),
        })
    }

    /// Load a custom CA bundle from a PEM file.
    fn load_custom_ca(&self, ca_path: &str) -> Result<RootCertStore> {
        let ca_cert_data = fs::read(ca_path).map_err(|e| {
            Error::TlsContext(format!("failed to read CA bundle '{}': {}", ca_path, e))
        })?;

        let mut reader = std::io::Cursor::new(&ca_cert_data);
        let mut root_store = RootCertStore::empty();
        let mut found_certs = 0;

        // A bundle may hold several certificates plus unrelated PEM items
        loop {
            match rustls_pemfile::read_one(&mut reader) {
                Ok(Some(Item::X509Certificate(cert))) => {
                    let _ = root_store.add_parsable_certificates(std::iter::once(cert));
                    found_certs += 1;
                }
                Ok(Some(_)) => {
                    // Skip non-certificate items (private keys, etc.)
                }
                Ok(None) => break,
                Err(_) => {
                    return Err(Error::TlsContext(format!(
                        "failed to parse CA certificate from '{}'",
                        ca_path
                    )));
                }
            }
        }

        if found_certs == 0 {
            return Err(Error::TlsContext(format!(
                "no valid certificates found in '{}'",
                ca_path
            )));
        }

        Ok(root_store)
    }
}

/// Certificate verifier that accepts everything.
///
/// Backs [`VerifyMode::None`]. The session is still encrypted; only the
/// identity check is skipped.
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls_pki_types::CertificateDer<'_>,
        _intermediates: &[rustls_pki_types::CertificateDer<'_>],
        _server_name: &rustls_pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls_pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls_pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls_pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::aws_lc_rs::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Parse server name from hostname for TLS SNI (Server Name Indication).
///
/// # Errors
///
/// Returns an error if the hostname is empty, too long, or contains
/// characters not valid in a DNS name.
pub fn parse_server_name(hostname: &str) -> Result<String> {
    // Remove trailing dot if present
    let hostname = hostname.trim_end_matches('.');

    if hostname.is_empty() || hostname.len() > 253 {
        return Err(Error::Config(format!(
            "invalid hostname for TLS: '{}'",
            hostname
        )));
    }

    if !hostname
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '.')
    {
        return Err(Error::Config(format!(
            "invalid hostname for TLS: '{}'",
            hostname
        )));
    }

    Ok(hostname.to_string())
}
