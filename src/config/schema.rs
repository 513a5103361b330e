//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits; every field has a default so partial
//! documents merge over the documented defaults.

use std::fmt;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::instance::InstanceSpec;

/// Root configuration for the traffic router daemon.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Balancer algorithm, health check and breaker settings.
    pub balancer: LoadBalancerConfig,

    /// Instances registered at startup.
    pub instances: Vec<InstanceSpec>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Period between stats log lines in milliseconds.
    pub stats_interval_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            balancer: LoadBalancerConfig::default(),
            instances: Vec::new(),
            observability: ObservabilityConfig::default(),
            stats_interval_ms: 60_000,
        }
    }
}

/// Instance selection algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    #[default]
    RoundRobin,
    Weighted,
    LeastConnections,
    IpHash,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::RoundRobin => write!(f, "round-robin"),
            Algorithm::Weighted => write!(f, "weighted"),
            Algorithm::LeastConnections => write!(f, "least-connections"),
            Algorithm::IpHash => write!(f, "ip-hash"),
        }
    }
}

/// Load balancer configuration. Immutable once the balancer is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoadBalancerConfig {
    pub algorithm: Algorithm,
    pub health_check: HealthCheckConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

/// Health check configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks in the daemon.
    pub enabled: bool,

    /// Probe interval in milliseconds.
    pub interval_ms: u64,

    /// Per-attempt probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Extra attempts within one tick before marking an instance unhealthy.
    pub retries: u32,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Base delay between probe attempts in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Upper bound on the delay between probe attempts in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 30_000,
            timeout_ms: 5_000,
            retries: 3,
            path: "/health".to_string(),
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 1_000,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,

    /// Time an open breaker waits before allowing trial traffic, in milliseconds.
    pub recovery_timeout_ms: u64,

    /// Window in milliseconds within which failures count as consecutive (0 = unbounded).
    pub monitoring_period_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 60_000,
            monitoring_period_ms: 60_000,
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
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
