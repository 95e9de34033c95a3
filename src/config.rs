//! Relay configuration loaded from YAML.
//!
//! This config is intentionally small and focused on buffering behavior and safe defaults.

use std::net::SocketAddr;

use serde::Deserialize;
use url::Url;

fn default_quiet_window_ms() -> u64 {
    8_000
}

fn default_max_queue_depth_per_key() -> usize {
    1_000
}

fn default_idle_ttl_ms() -> u64 {
    30_000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
/// Top-level relay configuration.
pub struct RelayConfig {
    /// Address the relay listens on (e.g. `127.0.0.1:3000`).
    pub listen_addr: SocketAddr,
    /// Endpoint flushed turns are posted to.
    pub responder_url: Url,

    #[serde(default = "default_quiet_window_ms")]
    /// Quiet window, measured from the first message of a burst, before the batch is flushed.
    pub quiet_window_ms: u64,

    #[serde(default = "default_max_queue_depth_per_key")]
    /// Per-sender queue depth. When full, submissions are rejected with 429.
    pub max_queue_depth_per_key: usize,

    #[serde(default = "default_idle_ttl_ms")]
    /// If a sender sees no traffic for this long, its buffering task is evicted.
    pub idle_ttl_ms: u64,

    #[serde(default = "default_max_body_bytes")]
    /// Maximum accepted request body size.
    pub max_body_bytes: usize,
}

impl RelayConfig {
    /// Parse a YAML relay config from bytes.
    pub fn from_yaml_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_optional_fields() {
        let yaml = br#"
listen_addr: "127.0.0.1:3000"
responder_url: "http://127.0.0.1:8080/v1/turns"
"#;
        let cfg = RelayConfig::from_yaml_bytes(yaml).unwrap();
        assert_eq!(cfg.quiet_window_ms, 8_000);
        assert_eq!(cfg.max_queue_depth_per_key, 1_000);
        assert_eq!(cfg.idle_ttl_ms, 30_000);
        assert_eq!(cfg.max_body_bytes, 1024 * 1024);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let yaml = br#"
listen_addr: "0.0.0.0:8081"
responder_url: "http://responder.internal/v1/turns"
quiet_window_ms: 2000
max_queue_depth_per_key: 50
idle_ttl_ms: 5000
"#;
        let cfg = RelayConfig::from_yaml_bytes(yaml).unwrap();
        assert_eq!(cfg.quiet_window_ms, 2_000);
        assert_eq!(cfg.max_queue_depth_per_key, 50);
        assert_eq!(cfg.idle_ttl_ms, 5_000);
        assert_eq!(cfg.responder_url.as_str(), "http://responder.internal/v1/turns");
    }
}
