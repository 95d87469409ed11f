//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, body limit > 0)
//! - Check addresses and CIDR ranges parse
//! - Detect conflicting trust modes
//!
//! # Design Decisions
//! - Returns all issues, not just the first
//! - Pure function: AppConfig → Result<(), Vec<ConfigIssue>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::trust::{Cidr, CidrError};

/// A semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("listener.body_limit_bytes must be greater than 0")]
    BodyLimit,

    #[error("timeouts.request_secs must be greater than 0")]
    RequestTimeout,

    #[error("trust.{section}: {source}")]
    Cidr {
        section: &'static str,
        #[source]
        source: CidrError,
    },

    #[error("trust: cannot trust both X-Forwarded-For and X-Real-IP")]
    ConflictingTrust,

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Check a parsed configuration, collecting every issue.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        issues.push(ConfigIssue::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.body_limit_bytes == 0 {
        issues.push(ConfigIssue::BodyLimit);
    }
    if config.timeouts.request_secs == 0 {
        issues.push(ConfigIssue::RequestTimeout);
    }

    let ranges = [
        ("xff_cidrs", &config.trust.xff_cidrs),
        ("real_ip_cidrs", &config.trust.real_ip_cidrs),
    ];
    for (section, cidrs) in ranges {
        for cidr in cidrs {
            if let Err(source) = cidr.parse::<Cidr>() {
                issues.push(ConfigIssue::Cidr { section, source });
            }
        }
    }
    if !config.trust.xff_cidrs.is_empty() && !config.trust.real_ip_cidrs.is_empty() {
        issues.push(ConfigIssue::ConflictingTrust);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        issues.push(ConfigIssue::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_issues() {
        let mut config = AppConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.timeouts.request_secs = 0;
        config.trust.xff_cidrs = vec!["10.0.0.0/8".into(), "10.0.0.1".into()];
        config.trust.real_ip_cidrs = vec!["192.168.0.0/16".into()];

        let issues = validate_config(&config).unwrap_err();
        assert_eq!(issues.len(), 4);
        assert!(issues.contains(&ConfigIssue::ConflictingTrust));
        assert!(issues.contains(&ConfigIssue::RequestTimeout));
        assert!(matches!(
            issues.iter().find(|i| matches!(i, ConfigIssue::Cidr { .. })),
            Some(ConfigIssue::Cidr { section: "xff_cidrs", .. })
        ));
    }
}
