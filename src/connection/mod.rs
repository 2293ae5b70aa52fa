//! Connection management
//!
//! This module handles:
//! * Transport abstraction (plain TCP vs TLS-encrypted TCP)
//! * Connection lifecycle (resolve, connect, TLS handshake, close)
//! * State machine enforcement
//! * TLS configuration and support

mod config;
mod conn;
mod state;
mod tls;
mod transport;

pub use config::{ConnectConfig, ConnectConfigBuilder, DEFAULT_PORT};
pub use conn::Connection;
pub use state::ConnectionState;
pub use tls::{initialize, parse_server_name, TlsConfig, TlsConfigBuilder, VerifyMode};
pub use transport::Transport;
