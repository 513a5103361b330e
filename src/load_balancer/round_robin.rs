//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use crate::instance::ServiceInstance;
use crate::load_balancer::Selector;

/// Round-robin selector.
/// Stores an internal counter to rotate through candidates.
///
/// The cursor is never reset when membership changes, so the first pick after
/// an add or remove may skip or repeat an instance.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for RoundRobin {
    fn next_instance<'a>(
        &self,
        candidates: &'a [ServiceInstance],
        _client_ip: Option<&str>,
    ) -> Option<&'a ServiceInstance> {
        if candidates.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        candidates.get(index)
    }
}
