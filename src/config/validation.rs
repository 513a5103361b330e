//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, ports and weights non-zero)
//! - Detect duplicate static instance ids
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;
use crate::config::schema::RouterConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("health check path must start with a single '/', got {0:?}")]
    RelativePath(String),

    #[error("instance #{index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },

    #[error("instance {id} has invalid {field}: must be greater than zero")]
    InvalidInstance { id: String, field: &'static str },

    #[error("duplicate instance id {0}")]
    DuplicateId(String),
}

/// Check a configuration, collecting every violation.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let hc = &config.balancer.health_check;
    let cb = &config.balancer.circuit_breaker;

    if hc.interval_ms == 0 {
        errors.push(ValidationError::Zero { field: "health_check.interval_ms" });
    }
    if hc.timeout_ms == 0 {
        errors.push(ValidationError::Zero { field: "health_check.timeout_ms" });
    }
    if !hc.path.starts_with('/') || hc.path.starts_with("//") {
        errors.push(ValidationError::RelativePath(hc.path.clone()));
    }
    if cb.failure_threshold == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.failure_threshold" });
    }
    if config.stats_interval_ms == 0 {
        errors.push(ValidationError::Zero { field: "stats_interval_ms" });
    }

    let mut seen = HashSet::new();
    for (index, instance) in config.instances.iter().enumerate() {
        if instance.id.is_empty() {
            errors.push(ValidationError::EmptyField { index, field: "id" });
        }
        if instance.host.is_empty() {
            errors.push(ValidationError::EmptyField { index, field: "host" });
        }
        if instance.port == 0 {
            errors.push(ValidationError::InvalidInstance { id: instance.id.clone(), field: "port" });
        }
        if instance.weight == 0 {
            errors.push(ValidationError::InvalidInstance { id: instance.id.clone(), field: "weight" });
        }
        if !instance.id.is_empty() && !seen.insert(instance.id.as_str()) {
            errors.push(ValidationError::DuplicateId(instance.id.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceSpec;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RouterConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = RouterConfig::default();
        config.balancer.health_check.interval_ms = 0;
        config.balancer.health_check.path = "health".into();
        config.instances.push(InstanceSpec::new("a", "", 0).with_weight(0));
        config.instances.push(InstanceSpec::new("a", "h", 80));

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::Zero { field: "health_check.interval_ms" }));
        assert!(errors.contains(&ValidationError::RelativePath("health".into())));
        assert!(errors.contains(&ValidationError::EmptyField { index: 0, field: "host" }));
        assert!(errors.contains(&ValidationError::InvalidInstance { id: "a".into(), field: "port" }));
        assert!(errors.contains(&ValidationError::InvalidInstance { id: "a".into(), field: "weight" }));
        assert!(errors.contains(&ValidationError::DuplicateId("a".into())));
        assert_eq!(errors.len(), 6);
    }

    #[test]
    fn test_rejects_authority_in_path() {
        let mut config = RouterConfig::default();
        config.balancer.health_check.path = "//evil.example/x".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::RelativePath("//evil.example/x".into())]);
    }
}
