//! Aggregate balancer statistics.

use serde::Serialize;
use crate::config::Algorithm;
use crate::instance::{InstanceStatus, ServiceInstance};

/// Per-instance view exposed in stats. Breaker internals are not included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSummary {
    pub id: String,
    pub address: String,
    pub status: InstanceStatus,
    pub weight: u32,
    pub connections: u64,
    pub response_time_ms: u64,
}

/// Point-in-time totals across every registered instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadBalancerStats {
    pub algorithm: Algorithm,
    pub total_instances: usize,
    pub healthy_instances: usize,
    pub total_connections: u64,
    /// Mean of the instances' latest response times (0 with no instances).
    pub average_response_time_ms: f64,
    pub instances: Vec<InstanceSummary>,
}

impl LoadBalancerStats {
    pub fn from_instances(algorithm: Algorithm, instances: &[ServiceInstance]) -> Self {
        let total_instances = instances.len();
        let healthy_instances = instances.iter().filter(|i| i.is_healthy()).count();
        let total_connections = instances.iter().map(|i| i.connections).sum();
        let average_response_time_ms = if total_instances == 0 {
            0.0
        } else {
            instances.iter().map(|i| i.response_time_ms as f64).sum::<f64>() / total_instances as f64
        };

        Self {
            algorithm,
            total_instances,
            healthy_instances,
            total_connections,
            average_response_time_ms,
            instances: instances
                .iter()
                .map(|i| InstanceSummary {
                    id: i.id.clone(),
                    address: i.authority(),
                    status: i.status,
                    weight: i.weight,
                    connections: i.connections,
                    response_time_ms: i.response_time_ms,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::instance;

    #[test]
    fn test_empty_stats() {
        let stats = LoadBalancerStats::from_instances(Algorithm::RoundRobin, &[]);
        assert_eq!(stats.total_instances, 0);
        assert_eq!(stats.average_response_time_ms, 0.0);
    }

    #[test]
    fn test_totals() {
        let mut a = instance("a", 1, 2);
        a.response_time_ms = 10;
        let mut b = instance("b", 1, 3);
        b.response_time_ms = 30;
        b.status = InstanceStatus::Unhealthy;

        let stats = LoadBalancerStats::from_instances(Algorithm::Weighted, &[a, b]);
        assert_eq!(stats.total_instances, 2);
        assert_eq!(stats.healthy_instances, 1);
        assert_eq!(stats.total_connections, 5);
        assert_eq!(stats.average_response_time_ms, 20.0);
        assert_eq!(stats.instances[1].address, "127.0.0.1:8000");
    }
}
