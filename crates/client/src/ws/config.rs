//! Connection configuration.

use std::time::Duration;

/// Configuration for one realtime connection. Immutable for the lifetime of
/// the owning [`super::WsConnection`].
///
/// The delay between reconnect attempts is fixed, not exponential. Earlier
/// clients shipped an exponential-backoff variant; the fixed schedule is the
/// documented behavior here.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Full endpoint URL, including any identity/session query parameters.
    /// Building this URL is the caller's job (see `AuthSession::ws_url_with_identity`).
    pub endpoint_url: String,
    /// Fixed delay between reconnect attempts, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Reconnect attempt budget. Once spent, the connection goes `Errored`
    /// and stays there until the caller intervenes.
    pub max_reconnect_attempts: u32,
}

impl ConnectionConfig {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            reconnect_delay_ms: 1000,
            max_reconnect_attempts: 10,
        }
    }

    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
