//! Least Connections load balancing strategy.

use crate::instance::ServiceInstance;
use crate::load_balancer::Selector;

/// Least connections selector.
/// Selects the instance with the minimum number of in-flight connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl Selector for LeastConnections {
    fn next_instance<'a>(
        &self,
        candidates: &'a [ServiceInstance],
        _client_ip: Option<&str>,
    ) -> Option<&'a ServiceInstance> {
        // min_by_key keeps the first minimum, so ties go to registration order
        candidates.iter().min_by_key(|i| i.connections)
    }
}
