use serde::{Deserialize, Serialize};

pub const DEFAULT_WS_URL: &str = "wss://futures.zb.land/ws/public/v1";
const DEFAULT_RECEIVE_LIMIT_MS: u64 = 60_000;
const DEFAULT_CONNECTION_DELAY_FAILURE: i64 = 15;
const DEFAULT_WATCHDOG_INTERVAL_MS: u64 = 1_000;
const DEFAULT_LOGIN_TIMEOUT_MS: u64 = 5_000;

/// Settings shared by the public and the account stream clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// The stream endpoint.
    pub url: String,
    /// Whether the watchdog reconnects lost or silent connections.
    pub is_auto_connect: bool,
    /// A connection that has received nothing for this long is considered dead.
    pub receive_limit_ms: u64,
    /// Watchdog ticks to wait before reconnecting a dead connection.
    pub connection_delay_failure: i64,
    /// Watchdog tick period.
    pub watchdog_interval_ms: u64,
    /// Upper bound on waiting for the login handshake of the account stream.
    pub login_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            is_auto_connect: true,
            receive_limit_ms: DEFAULT_RECEIVE_LIMIT_MS,
            connection_delay_failure: DEFAULT_CONNECTION_DELAY_FAILURE,
            watchdog_interval_ms: DEFAULT_WATCHDOG_INTERVAL_MS,
            login_timeout_ms: DEFAULT_LOGIN_TIMEOUT_MS,
        }
    }
}

impl StreamConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.url, DEFAULT_WS_URL);
        assert!(config.is_auto_connect);
        assert_eq!(config.receive_limit_ms, 60_000);
        assert_eq!(config.connection_delay_failure, 15);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: StreamConfig =
            serde_json::from_str(r#"{"url": "ws://127.0.0.1:9000", "receive_limit_ms": 500}"#)
                .unwrap();
        assert_eq!(config.url, "ws://127.0.0.1:9000");
        assert_eq!(config.receive_limit_ms, 500);
        assert_eq!(config.connection_delay_failure, 15);
        assert!(config.is_auto_connect);
    }
}
