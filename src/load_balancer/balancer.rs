//! The load balancer.
//!
//! # Responsibilities
//! - Own the instance registry and the per-instance breakers
//! - Select an eligible instance per request with the configured algorithm
//! - Apply reported request outcomes to breakers
//! - Track in-flight connections
//!
//! # Design Decisions
//! - Cheap to clone; clones share state (the health checker holds one)
//! - Registry behind an `RwLock`, breakers in a `DashMap`; the registry lock is
//!   never acquired while a breaker entry is held
//! - Breakers are created, updated and removed only while the registry guard
//!   is held, so no breaker outlives its instance
//! - Callers only ever receive copies of instances

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;
use crate::config::LoadBalancerConfig;
use crate::health::{HealthCheckHandle, HealthChecker};
use crate::instance::{InstanceSpec, InstanceStatus, ServiceInstance};
use crate::load_balancer::{selector_for, LoadBalancerStats, Selector};
use crate::observability::metrics;
use crate::registry::{EntryKey, InstanceRegistry};
use crate::resilience::{BreakerRegistry, CircuitBreakerState, CircuitState};
use crate::time::{Clock, SystemClock};

#[derive(Debug)]
struct Inner {
    config: LoadBalancerConfig,
    registry: RwLock<InstanceRegistry>,
    breakers: BreakerRegistry,
    selector: Box<dyn Selector>,
    clock: Arc<dyn Clock>,
}

/// Selects healthy backend instances and isolates failing ones.
#[derive(Debug, Clone)]
pub struct LoadBalancer {
    inner: Arc<Inner>,
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self::new(LoadBalancerConfig::default())
    }
}

impl LoadBalancer {
    /// Create a balancer using the system clock.
    pub fn new(config: LoadBalancerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a balancer driven by `clock`.
    pub fn with_clock(config: LoadBalancerConfig, clock: Arc<dyn Clock>) -> Self {
        Self::from_parts(config, InstanceRegistry::new(), BreakerRegistry::new(), clock)
    }

    /// Assemble a balancer from pre-built registries.
    pub fn from_parts(
        config: LoadBalancerConfig,
        registry: InstanceRegistry,
        breakers: BreakerRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let selector = selector_for(config.algorithm);
        Self {
            inner: Arc::new(Inner {
                config,
                registry: RwLock::new(registry),
                breakers,
                selector,
                clock,
            }),
        }
    }

    pub fn config(&self) -> &LoadBalancerConfig {
        &self.inner.config
    }

    pub(crate) fn now(&self) -> SystemTime {
        self.inner.clock.now()
    }

    fn registry(&self) -> RwLockReadGuard<'_, InstanceRegistry> {
        self.inner.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, InstanceRegistry> {
        self.inner.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an instance as healthy with zeroed counters and a closed breaker.
    ///
    /// A second add with an existing id appends another entry.
    pub fn add_instance(&self, spec: InstanceSpec) {
        let now = self.now();
        let id = spec.id.clone();
        let address = format!("{}:{}", spec.host, spec.port);
        {
            let mut registry = self.registry_mut();
            if registry.contains(&id) {
                tracing::warn!(instance = %id, "Instance id already registered, appending duplicate");
            }
            registry.add(spec, now);
            self.inner.breakers.reset(&id);
        }
        metrics::record_instance_health(&id, true);
        tracing::info!(instance = %id, address = %address, "Instance added");
    }

    /// Remove every entry with `id` and its breaker. No-op if absent.
    pub fn remove_instance(&self, id: &str) {
        let removed = {
            let mut registry = self.registry_mut();
            let removed = registry.remove(id);
            self.inner.breakers.remove(id);
            removed
        };
        if removed > 0 {
            tracing::info!(instance = %id, removed, "Instance removed");
        } else {
            tracing::debug!(instance = %id, "Remove ignored, instance not registered");
        }
    }

    /// Mark an instance as draining so it receives no new traffic.
    ///
    /// Returns `false` if no instance has this id.
    pub fn drain_instance(&self, id: &str) -> bool {
        let mut registry = self.registry_mut();
        match registry.get_mut(id) {
            Some(instance) => {
                instance.status = InstanceStatus::Draining;
                metrics::record_instance_health(id, false);
                tracing::info!(instance = %id, connections = instance.connections, "Instance draining");
                true
            }
            None => false,
        }
    }

    /// Pick an instance for the next request.
    ///
    /// Only healthy instances whose breaker is not open are candidates.
    /// `None` means no capacity; the caller decides whether to fail or retry.
    pub fn get_available_instance(&self, client_ip: Option<&str>) -> Option<ServiceInstance> {
        let now = self.now();
        let registry = self.registry();
        let candidates: Vec<ServiceInstance> = registry
            .iter()
            .filter(|i| i.is_healthy())
            .filter(|i| self.inner.breakers.state_of(&i.id, now) != CircuitState::Open)
            .cloned()
            .collect();

        let selected = self
            .inner
            .selector
            .next_instance(&candidates, client_ip)
            .cloned();

        metrics::record_selection(selected.is_some());
        if selected.is_none() {
            tracing::debug!(
                registered = registry.len(),
                algorithm = %self.inner.config.algorithm,
                "No available instance"
            );
        }
        selected
    }

    /// Report the outcome of a request sent to `id`.
    pub fn record_request(&self, id: &str, success: bool, response_time_ms: u64) {
        let now = self.now();
        // Breakers only change while the registry guard is held.
        let mut registry = self.registry_mut();
        match registry.get_mut(id) {
            Some(instance) => instance.response_time_ms = response_time_ms,
            None => {
                tracing::debug!(instance = %id, "Outcome ignored, instance not registered");
                return;
            }
        }
        self.inner
            .breakers
            .record(id, success, now, &self.inner.config.circuit_breaker);
    }

    pub fn start_connection(&self, id: &str) {
        if let Some(instance) = self.registry_mut().get_mut(id) {
            instance.inc_connections();
            metrics::record_connections(id, instance.connections);
        }
    }

    /// Decrement the connection count; never goes below zero.
    pub fn end_connection(&self, id: &str) {
        if let Some(instance) = self.registry_mut().get_mut(id) {
            instance.dec_connections();
            metrics::record_connections(id, instance.connections);
        }
    }

    /// Copies of every registered instance.
    pub fn get_instances_status(&self) -> Vec<ServiceInstance> {
        self.registry().snapshot()
    }

    pub fn get_stats(&self) -> LoadBalancerStats {
        LoadBalancerStats::from_instances(self.inner.config.algorithm, &self.registry().snapshot())
    }

    /// Effective breaker state for `id` (applies the lazy open → half-open rule).
    ///
    /// Unknown ids read as closed without creating a breaker.
    pub fn circuit_state(&self, id: &str) -> CircuitState {
        let registry = self.registry();
        if !registry.contains(id) {
            return CircuitState::Closed;
        }
        self.inner.breakers.state_of(id, self.now())
    }

    /// Stored breaker state for `id`, if one exists.
    pub fn circuit_breaker(&self, id: &str) -> Option<CircuitBreakerState> {
        self.inner.breakers.snapshot(id)
    }

    /// Spawn the periodic health checker for this balancer.
    pub fn start_health_checks(&self) -> HealthCheckHandle {
        HealthChecker::new(self.clone()).spawn()
    }

    pub(crate) fn probe_targets(&self) -> Vec<(EntryKey, ServiceInstance)> {
        self.registry().keyed_snapshot()
    }

    pub(crate) fn apply_probe(
        &self,
        key: EntryKey,
        healthy: bool,
        response_time_ms: u64,
        checked_at: SystemTime,
    ) -> Option<(InstanceStatus, InstanceStatus)> {
        self.registry_mut()
            .apply_probe(key, healthy, response_time_ms, checked_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::config::{Algorithm, CircuitBreakerConfig};
    use crate::time::ManualClock;

    fn balancer(algorithm: Algorithm) -> (LoadBalancer, ManualClock) {
        let clock = ManualClock::default();
        let config = LoadBalancerConfig {
            algorithm,
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 3,
                recovery_timeout_ms: 1_000,
                monitoring_period_ms: 60_000,
            },
            ..Default::default()
        };
        (LoadBalancer::with_clock(config, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_add_initializes_instance_and_breaker() {
        let (lb, clock) = balancer(Algorithm::RoundRobin);
        lb.add_instance(InstanceSpec::new("a", "10.0.0.1", 80));

        let status = lb.get_instances_status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].status, InstanceStatus::Healthy);
        assert_eq!(status[0].connections, 0);
        assert_eq!(status[0].last_check, clock.now());
        assert_eq!(lb.circuit_breaker("a"), Some(CircuitBreakerState::closed()));
    }

    #[test]
    fn test_remove_deletes_breaker() {
        let (lb, _) = balancer(Algorithm::RoundRobin);
        lb.add_instance(InstanceSpec::new("a", "h", 80));
        lb.remove_instance("a");
        lb.remove_instance("a");
        assert!(lb.get_instances_status().is_empty());
        assert!(lb.circuit_breaker("a").is_none());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let (lb, _) = balancer(Algorithm::RoundRobin);
        lb.add_instance(InstanceSpec::new("a", "h", 80));
        let mut snapshot = lb.get_instances_status();
        snapshot[0].connections = 99;
        snapshot[0].status = InstanceStatus::Unhealthy;
        assert_eq!(lb.get_instances_status()[0].connections, 0);
        assert!(lb.get_available_instance(None).is_some());
    }

    #[test]
    fn test_unhealthy_and_draining_are_skipped() {
        let (lb, _) = balancer(Algorithm::RoundRobin);
        lb.add_instance(InstanceSpec::new("a", "h", 80));
        lb.add_instance(InstanceSpec::new("b", "h", 81));
        assert!(lb.drain_instance("a"));
        assert!(!lb.drain_instance("missing"));

        for _ in 0..4 {
            assert_eq!(lb.get_available_instance(None).unwrap().id, "b");
        }
    }

    #[test]
    fn test_breaker_excludes_and_recovers() {
        let (lb, clock) = balancer(Algorithm::RoundRobin);
        lb.add_instance(InstanceSpec::new("a", "h", 80));

        for _ in 0..3 {
            lb.record_request("a", false, 10);
        }
        assert_eq!(lb.circuit_state("a"), CircuitState::Open);
        assert!(lb.get_available_instance(None).is_none());

        clock.advance(Duration::from_millis(1_001));
        let probe = lb.get_available_instance(None).unwrap();
        assert_eq!(probe.id, "a");
        assert_eq!(lb.circuit_breaker("a").unwrap().state, CircuitState::HalfOpen);

        lb.record_request("a", true, 5);
        let cb = lb.circuit_breaker("a").unwrap();
        assert_eq!(cb.state, CircuitState::Closed);
        assert!(cb.next_retry_at.is_none());
        assert_eq!(lb.get_instances_status()[0].response_time_ms, 5);
    }

    #[test]
    fn test_record_for_unknown_id_is_ignored() {
        let (lb, _) = balancer(Algorithm::RoundRobin);
        lb.record_request("ghost", false, 1);
        assert!(lb.circuit_breaker("ghost").is_none());
    }

    #[test]
    fn test_outcomes_racing_removal_leave_no_breaker() {
        let (lb, _) = balancer(Algorithm::RoundRobin);
        for _ in 0..200 {
            lb.add_instance(InstanceSpec::new("a", "h", 80));
            let reporter = {
                let lb = lb.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        lb.record_request("a", false, 1);
                    }
                })
            };
            lb.remove_instance("a");
            reporter.join().unwrap();
            assert!(lb.circuit_breaker("a").is_none());
        }
    }

    #[test]
    fn test_circuit_state_of_unknown_id_creates_nothing() {
        let (lb, _) = balancer(Algorithm::RoundRobin);
        assert_eq!(lb.circuit_state("ghost"), CircuitState::Closed);
        assert!(lb.circuit_breaker("ghost").is_none());
    }

    #[test]
    fn test_connections_counting() {
        let (lb, _) = balancer(Algorithm::LeastConnections);
        lb.add_instance(InstanceSpec::new("a", "h", 80));
        lb.end_connection("a");
        lb.start_connection("a");
        lb.start_connection("a");
        lb.end_connection("a");
        assert_eq!(lb.get_instances_status()[0].connections, 1);
        assert_eq!(lb.get_stats().total_connections, 1);
    }

    #[test]
    fn test_duplicate_ids_share_breaker() {
        let (lb, _) = balancer(Algorithm::RoundRobin);
        lb.add_instance(InstanceSpec::new("a", "h", 80));
        lb.add_instance(InstanceSpec::new("a", "h", 81));
        assert_eq!(lb.get_instances_status().len(), 2);

        for _ in 0..3 {
            lb.record_request("a", false, 1);
        }
        assert!(lb.get_available_instance(None).is_none());
    }
}
