//! Link configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`LinkClient`](crate::LinkClient).
///
/// Derives serde so a host application can embed it in its own config
/// file. Missing fields fall back to [`LinkConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Address used by `force_reconnect` before any explicit `connect`.
    pub server_url: String,

    /// Start with offline mode on: connects are refused and sends are
    /// suppressed until it is turned off.
    pub offline_mode: bool,

    /// Give up on a dial after this long. `None` waits for the transport.
    pub connect_timeout: Option<Duration>,

    /// How long a replaced handle may take to finish its close handshake
    /// before it is dropped outright.
    pub close_timeout: Duration,

    /// Capacity of the caller → manager command queue.
    pub command_buffer: usize,

    /// Capacity of the handle → manager event queue. Readers wait when it
    /// is full, which pushes back on the transport.
    pub event_buffer: usize,
}

impl LinkConfig {
    pub const DEFAULT_SERVER_URL: &'static str = "ws://localhost:8080/ws";
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            server_url: Self::DEFAULT_SERVER_URL.to_string(),
            offline_mode: false,
            connect_timeout: Some(Duration::from_secs(10)),
            close_timeout: Duration::from_secs(5),
            command_buffer: 64,
            event_buffer: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LinkConfig::default();
        assert_eq!(config.server_url, "ws://localhost:8080/ws");
        assert!(!config.offline_mode);
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.close_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: LinkConfig =
            serde_json::from_str(r#"{"offline_mode": true}"#).unwrap();
        assert!(config.offline_mode);
        assert_eq!(config.server_url, LinkConfig::DEFAULT_SERVER_URL);
        assert_eq!(config.event_buffer, 256);
    }

    #[test]
    fn test_timeout_can_be_disabled() {
        let config: LinkConfig =
            serde_json::from_str(r#"{"connect_timeout": null}"#).unwrap();
        assert_eq!(config.connect_timeout, None);
    }
}
