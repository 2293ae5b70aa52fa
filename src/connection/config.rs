//! Connection configuration

use super::tls::VerifyMode;
use std::time::Duration;

/// Default MongoDB port
pub const DEFAULT_PORT: u16 = 27017;

/// Connection configuration
///
/// Stores the parameters needed to open a connection: the remote endpoint,
/// whether to speak TLS, the certificate verification policy, and an optional
/// connect deadline. Use [`ConnectConfig::builder`] for anything beyond a
/// plaintext connection with defaults.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Remote host
    pub host: String,
    /// Remote port
    pub port: u16,
    /// Whether to upgrade the connection to TLS after TCP connect
    pub use_tls: bool,
    /// Certificate verification policy (only consulted when `use_tls` is set)
    pub verify_mode: VerifyMode,
    /// Path to a custom CA bundle in PEM format (None = system roots)
    pub ca_bundle_path: Option<String>,
    /// Deadline applied to the TCP connect and to the TLS handshake
    pub connect_timeout: Option<Duration>,
}

impl ConnectConfig {
    /// Create new configuration with defaults
    ///
    /// # Defaults
    ///
    /// - `use_tls`: false
    /// - `verify_mode`: [`VerifyMode::Peer`]
    /// - `ca_bundle_path`: None
    /// - `connect_timeout`: None
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            use_tls: false,
            verify_mode: VerifyMode::default(),
            ca_bundle_path: None,
            connect_timeout: None,
        }
    }

    /// Create a builder for advanced configuration
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = ConnectConfig::builder("db.example.com", 27017)
    ///     .use_tls(true)
    ///     .connect_timeout(Duration::from_secs(10))
    ///     .build();
    /// ```
    pub fn builder(host: impl Into<String>, port: u16) -> ConnectConfigBuilder {
        ConnectConfigBuilder {
            host: host.into(),
            port,
            use_tls: false,
            verify_mode: VerifyMode::default(),
            ca_bundle_path: None,
            connect_timeout: None,
        }
    }
}

/// Builder for creating `ConnectConfig` with advanced options
#[derive(Debug, Clone)]
pub struct ConnectConfigBuilder {
    host: String,
    port: u16,
    use_tls: bool,
    verify_mode: VerifyMode,
    ca_bundle_path: Option<String>,
    connect_timeout: Option<Duration>,
}

impl ConnectConfigBuilder {
    /// Enable or disable TLS (default: disabled)
    pub fn use_tls(mut self, enabled: bool) -> Self {
        self.use_tls = enabled;
        self
    }

    /// Set the certificate verification policy (default: [`VerifyMode::Peer`])
    pub fn verify_mode(mut self, mode: VerifyMode) -> Self {
        self.verify_mode = mode;
        self
    }

    /// Set the path to a custom CA bundle (PEM format)
    pub fn ca_bundle_path(mut self, path: impl Into<String>) -> Self {
        self.ca_bundle_path = Some(path.into());
        self
    }

    /// Set the connection establishment deadline
    ///
    /// Applied to the resolve-and-connect stage and, when TLS is enabled,
    /// again to the handshake stage.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectConfig {
        ConnectConfig {
            host: self.host,
            port: self.port,
            use_tls: self.use_tls,
            verify_mode: self.verify_mode,
            ca_bundle_path: self.ca_bundle_path,
            connect_timeout: self.connect_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ConnectConfig::new("localhost", DEFAULT_PORT);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 27017);
        assert!(!config.use_tls);
        assert_eq!(config.verify_mode, VerifyMode::Peer);
        assert!(config.ca_bundle_path.is_none());
        assert!(config.connect_timeout.is_none());
    }

    #[test]
    fn test_builder_sets_all_fields() {
        let config = ConnectConfig::builder("db.example.com", 27018)
            .use_tls(true)
            .verify_mode(VerifyMode::None)
            .ca_bundle_path("/etc/ssl/mongo-ca.pem")
            .connect_timeout(Duration::from_secs(5))
            .build();

        assert_eq!(config.host, "db.example.com");
        assert_eq!(config.port, 27018);
        assert!(config.use_tls);
        assert_eq!(config.verify_mode, VerifyMode::None);
        assert_eq!(config.ca_bundle_path.as_deref(), Some("/etc/ssl/mongo-ca.pem"));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(5)));
    }
}
