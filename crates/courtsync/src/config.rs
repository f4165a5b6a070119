//! Gateway settings.

use std::time::Duration;

/// Per-connection settings for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// How long a newly accepted connection may take to finish its
    /// WebSocket handshake before it is dropped.
    pub handshake_timeout: Duration,
    /// How long to wait after sending the auth-failure frame before
    /// closing, so the client gets to read it.
    pub auth_failure_pause: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            auth_failure_pause: Duration::from_millis(200),
        }
    }
}
