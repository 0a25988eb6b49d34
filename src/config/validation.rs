//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and paths. All
//! problems are reported at once, not just the first.

use std::net::IpAddr;
use std::path::PathBuf;

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

use crate::config::schema::EngineConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.port must be between 1 and 65535")]
    InvalidPort,

    #[error("listener.bind_host '{0}' is not an IP address")]
    InvalidBindHost(String),

    #[error("listener.max_connections must be at least 1")]
    NoConnections,

    #[error("store.home_dir is not set")]
    EmptyHomeDir,

    #[error("store.home_dir '{}' is not an absolute path", .0.display())]
    RelativeHomeDir(PathBuf),

    #[error("store.readers must be at least 1")]
    NoReaders,

    #[error(
        "timeouts.request_secs ({request_secs}s) must exceed store.busy_timeout_ms ({busy_timeout_ms}ms)"
    )]
    RequestTimeoutTooShort {
        request_secs: u64,
        busy_timeout_ms: u64,
    },

    #[error("observability.log_level '{0}' is not a known level")]
    InvalidLogLevel(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::InvalidPort);
    }
    if config.listener.bind_host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidBindHost(config.listener.bind_host.clone()));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::NoConnections);
    }

    let home = &config.store.home_dir;
    if home.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyHomeDir);
    } else if !home.is_absolute() {
        errors.push(ValidationError::RelativeHomeDir(home.clone()));
    }
    if config.store.readers == 0 {
        errors.push(ValidationError::NoReaders);
    }

    // A lookup may wait busy_timeout_ms; it must not outlive its request.
    let request_ms = config.timeouts.request_secs.saturating_mul(1_000);
    if request_ms <= config.store.busy_timeout_ms {
        errors.push(ValidationError::RequestTimeoutTooShort {
            request_secs: config.timeouts.request_secs,
            busy_timeout_ms: config.store.busy_timeout_ms,
        });
    }

    let observability = &config.observability;
    if observability.log_level.parse::<LevelFilter>().is_err() {
        errors.push(ValidationError::InvalidLogLevel(observability.log_level.clone()));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
