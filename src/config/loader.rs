//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;
use crate::config::schema::RouterConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a (possibly partial) TOML document over the defaults and validate it.
pub fn parse_config(content: &str) -> Result<RouterConfig, ConfigError> {
    let config: RouterConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Algorithm;

    #[test]
    fn test_partial_config_merges_over_defaults() {
        let config = parse_config(
            r#"
            [balancer]
            algorithm = "weighted"

            [balancer.health_check]
            timeout_ms = 250

            [[instances]]
            id = "api-1"
            host = "10.0.0.5"
            port = 8080
            weight = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.balancer.algorithm, Algorithm::Weighted);
        assert_eq!(config.balancer.health_check.timeout_ms, 250);
        assert_eq!(config.balancer.health_check.interval_ms, 30_000);
        assert_eq!(config.balancer.health_check.path, "/health");
        assert_eq!(config.balancer.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.instances.len(), 1);
        assert_eq!(config.instances[0].weight, 4);
    }

    #[test]
    fn test_empty_document_is_all_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.balancer, Default::default());
        assert!(config.instances.is_empty());
        assert_eq!(config.stats_interval_ms, 60_000);
    }

    #[test]
    fn test_unknown_algorithm_is_parse_error() {
        let err = parse_config("[balancer]\nalgorithm = \"random\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = parse_config("[balancer.circuit_breaker]\nfailure_threshold = 0\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/router.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
