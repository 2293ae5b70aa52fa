//! Metrics instrumentation for connection lifecycle events.
//!
//! Thin helpers over the `metrics` facade so call sites stay one-liners.
//! A downstream application installs its own recorder; without one these
//! calls are no-ops.

/// Label values shared across connection metrics
pub mod labels {
    /// Plaintext TCP transport
    pub const MODE_PLAIN: &str = "plain";
    /// TLS-encrypted transport
    pub const MODE_TLS: &str = "tls";
}

/// Counter helpers
pub mod counters {
    /// A connection attempt was started
    pub fn connect_attempted(mode: &'static str) {
        metrics::counter!("mongo_socket_connect_attempts_total", "mode" => mode).increment(1);
    }

    /// A connection reached the established state
    pub fn connect_established(mode: &'static str) {
        metrics::counter!("mongo_socket_connect_established_total", "mode" => mode).increment(1);
    }

    /// A connection attempt failed before reaching the established state
    pub fn connect_failed(mode: &'static str, reason: &'static str) {
        metrics::counter!(
            "mongo_socket_connect_failures_total",
            "mode" => mode,
            "reason" => reason
        )
        .increment(1);
    }

    /// A connection was closed locally
    pub fn connection_closed(mode: &'static str) {
        metrics::counter!("mongo_socket_connections_closed_total", "mode" => mode).increment(1);
    }
}

/// Histogram helpers
pub mod histograms {
    /// Time from connect start to established, in milliseconds
    pub fn connect_duration(mode: &'static str, millis: u64) {
        metrics::histogram!("mongo_socket_connect_duration_ms", "mode" => mode)
            .record(millis as f64);
    }
}
