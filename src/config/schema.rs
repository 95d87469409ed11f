//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Client IP trust policy.
    pub trust: TrustSettings,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8888").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub body_limit_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8888".to_string(),
            body_limit_bytes: 32 * 1024 * 1024, // 32MB
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total handling time) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Which proxies are believed when deriving the client IP.
///
/// At most one of `xff_cidrs` and `real_ip_cidrs` may be non-empty.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrustSettings {
    /// Ranges whose `X-Forwarded-For` hops are trusted.
    pub xff_cidrs: Vec<String>,

    /// Ranges whose `X-Real-IP` header is trusted.
    pub real_ip_cidrs: Vec<String>,

    /// Implicitly trust loopback peers.
    pub trust_loopback: bool,

    /// Implicitly trust link-local peers.
    pub trust_link_local: bool,

    /// Implicitly trust private-network peers.
    pub trust_private_net: bool,
}

impl Default for TrustSettings {
    fn default() -> Self {
        Self {
            xff_cidrs: Vec::new(),
            real_ip_cidrs: Vec::new(),
            trust_loopback: true,
            trust_link_local: true,
            trust_private_net: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8888");
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(config.trust.trust_loopback);
        assert!(config.trust.xff_cidrs.is_empty());
    }

    #[test]
    fn test_partial_trust_section() {
        let config: AppConfig = toml::from_str(
            r#"
            [trust]
            xff_cidrs = ["10.0.0.0/8", "172.16.0.0/12"]
            trust_private_net = false
            "#,
        )
        .unwrap();
        assert_eq!(config.trust.xff_cidrs.len(), 2);
        assert!(!config.trust.trust_private_net);
        assert!(config.trust.trust_link_local);
    }
}
