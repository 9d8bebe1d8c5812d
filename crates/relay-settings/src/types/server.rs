//! Server network and transport settings.

use serde::{Deserialize, Serialize};

/// Server network and transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP port (`0` picks a free port).
    pub port: u16,
    /// Path that upgrades to the relay `WebSocket` protocol.
    pub ws_path: String,
    /// Server-initiated Ping interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Close the connection after this long without a Pong, in milliseconds.
    pub heartbeat_timeout_ms: u64,
    /// Max inbound `WebSocket` message size in bytes.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection; senders wait when it is full.
    pub outbound_queue: usize,
    /// Inbound frames buffered per connection while an answer streams.
    pub inbound_queue: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            ws_path: "/api/ws".to_string(),
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 90_000,
            max_message_size: 1024 * 1024,
            outbound_queue: 1024,
            inbound_queue: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_matches_upgrade_route() {
        assert_eq!(ServerSettings::default().ws_path, "/api/ws");
    }

    #[test]
    fn default_port() {
        assert_eq!(ServerSettings::default().port, 3000);
    }

    #[test]
    fn deserialize_partial() {
        let s: ServerSettings =
            serde_json::from_str(r#"{"host":"127.0.0.1","heartbeatIntervalMs":5000}"#).unwrap();
        assert_eq!(s.host, "127.0.0.1");
        assert_eq!(s.heartbeat_interval_ms, 5000);
        assert_eq!(s.outbound_queue, 1024);
    }
}
