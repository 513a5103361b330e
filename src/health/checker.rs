//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered instance
//! - Update instance status, last check time and response time
//! - Log healthy ↔ unhealthy transitions once per change

use std::time::Duration;
use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use crate::health::probe::{ProbeOutcome, Prober};
use crate::instance::{InstanceStatus, ServiceInstance};
use crate::lifecycle::Shutdown;
use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;
use crate::registry::EntryKey;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Timer-driven prober bound to one balancer.
pub struct HealthChecker {
    balancer: LoadBalancer,
    prober: Prober,
    interval: Duration,
}

impl HealthChecker {
    pub fn new(balancer: LoadBalancer) -> Self {
        let config = balancer.config().health_check.clone();
        Self {
            // `time::interval` rejects a zero period.
            interval: config.interval().max(MIN_INTERVAL),
            prober: Prober::new(config),
            balancer,
        }
    }

    /// Run on a background task. Dropping or stopping the handle ends the loop.
    pub fn spawn(self) -> HealthCheckHandle {
        let shutdown = Shutdown::new();
        let receiver = shutdown.subscribe();
        let task = tokio::spawn(self.run(receiver));
        HealthCheckHandle { shutdown, task }
    }

    /// Tick until a shutdown signal arrives. The first tick fires immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            path = %self.balancer.config().health_check.path,
            "Health checker starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => break,
            }
            // A slow tick must not delay shutdown.
            tokio::select! {
                _ = self.check_all() => {}
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Health checker stopped");
    }

    /// Probe every instance once, concurrently.
    pub async fn check_all(&self) {
        let targets = self.balancer.probe_targets();
        join_all(
            targets
                .into_iter()
                .map(|(key, instance)| self.check_one(key, instance)),
        )
        .await;
    }

    async fn check_one(&self, key: EntryKey, instance: ServiceInstance) {
        let outcome = self.prober.probe(&instance).await;
        let response_time_ms = outcome.elapsed.as_millis() as u64;
        metrics::record_probe(&instance.id, outcome.elapsed);

        let checked_at = self.balancer.now();
        match self
            .balancer
            .apply_probe(key, outcome.is_healthy(), response_time_ms, checked_at)
        {
            Some((previous, current)) => {
                metrics::record_instance_health(&instance.id, current == InstanceStatus::Healthy);
                if previous != current {
                    log_transition(&instance, previous, &outcome);
                }
            }
            None => {
                tracing::debug!(instance = %instance.id, "Instance removed while probe was in flight");
            }
        }
    }
}

fn log_transition(
    instance: &ServiceInstance,
    previous: InstanceStatus,
    outcome: &ProbeOutcome,
) {
    match &outcome.result {
        Ok(()) => tracing::info!(
            instance = %instance.id,
            address = %instance.authority(),
            from = %previous,
            "Instance is healthy"
        ),
        Err(e) => tracing::warn!(
            instance = %instance.id,
            address = %instance.authority(),
            from = %previous,
            attempts = outcome.attempts,
            error = %e,
            "Instance is unhealthy"
        ),
    }
}

/// Handle to a running health checker.
#[derive(Debug)]
pub struct HealthCheckHandle {
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

impl HealthCheckHandle {
    /// Signal the checker to stop and wait for the task to exit.
    pub async fn stop(self) {
        self.shutdown.trigger();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Health checker task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
