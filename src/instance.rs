//! Backend instance model.
//!
//! # Responsibilities
//! - Represent a single addressable backend (host:port)
//! - Carry the live status fields observed by health checks and request outcomes
//! - Track in-flight connections (never below zero)

use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;
use serde::{Deserialize, Serialize};

/// Health status of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Healthy,
    Unhealthy,
    /// Excluded from selection while existing traffic finishes.
    Draining,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::Healthy => write!(f, "healthy"),
            InstanceStatus::Unhealthy => write!(f, "unhealthy"),
            InstanceStatus::Draining => write!(f, "draining"),
        }
    }
}

/// Caller-supplied description of an instance to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSpec {
    /// Unique instance identifier.
    pub id: String,
    pub host: String,
    pub port: u16,
    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Opaque labels, not interpreted by the router.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_weight() -> u32 {
    1
}

impl InstanceSpec {
    /// Build a spec with weight 1 and no metadata.
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
            weight: default_weight(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A registered backend and its live status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub weight: u32,
    pub status: InstanceStatus,
    /// Time of the most recent probe (registration time until the first probe).
    pub last_check: SystemTime,
    /// In-flight request count.
    pub connections: u64,
    /// Most recent probe or request latency in milliseconds.
    pub response_time_ms: u64,
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    /// Materialize a spec as a fresh healthy instance with zeroed counters.
    pub fn from_spec(spec: InstanceSpec, now: SystemTime) -> Self {
        Self {
            id: spec.id,
            host: spec.host,
            port: spec.port,
            weight: spec.weight,
            status: InstanceStatus::Healthy,
            last_check: now,
            connections: 0,
            response_time_ms: 0,
            metadata: spec.metadata,
        }
    }

    /// `host:port` form used in logs and probe URLs.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_healthy(&self) -> bool {
        self.status == InstanceStatus::Healthy
    }

    pub fn inc_connections(&mut self) {
        self.connections = self.connections.saturating_add(1);
    }

    /// Decrement the connection count; a no-op at zero.
    pub fn dec_connections(&mut self) {
        self.connections = self.connections.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_instance_starts_healthy_and_idle() {
        let spec = InstanceSpec::new("a", "10.0.0.1", 8080)
            .with_weight(3)
            .with_metadata("zone", "eu-1");
        let instance = ServiceInstance::from_spec(spec, SystemTime::UNIX_EPOCH);

        assert_eq!(instance.status, InstanceStatus::Healthy);
        assert_eq!(instance.connections, 0);
        assert_eq!(instance.response_time_ms, 0);
        assert_eq!(instance.weight, 3);
        assert_eq!(instance.metadata.get("zone").map(String::as_str), Some("eu-1"));
        assert_eq!(instance.authority(), "10.0.0.1:8080");
    }

    #[test]
    fn test_connections_floor_at_zero() {
        let mut instance =
            ServiceInstance::from_spec(InstanceSpec::new("a", "h", 1), SystemTime::UNIX_EPOCH);
        instance.dec_connections();
        assert_eq!(instance.connections, 0);

        instance.inc_connections();
        instance.dec_connections();
        instance.dec_connections();
        assert_eq!(instance.connections, 0);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&InstanceStatus::Draining).unwrap();
        assert_eq!(json, "\"draining\"");
    }
}
