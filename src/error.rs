//! Crate-level error type for the daemon entry points.
//!
//! Library operations report "no capacity" as `None` and contain probe and
//! watcher failures internally, so only startup can fail.

use thiserror::Error;
use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid metrics address {address:?}: {source}")]
    MetricsAddress {
        address: String,
        source: std::net::AddrParseError,
    },
}

/// Result type for daemon startup.
pub type RouterResult<T> = Result<T, RouterError>;
