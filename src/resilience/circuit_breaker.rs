//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, excluded from selection
//! - Half-Open: trial traffic allowed to test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold within the monitoring window
//! Open → Half-Open: first read after next_retry_at (lazy, no timer)
//! Half-Open → Closed: next reported success
//! Half-Open → Open: next reported failure
//! ```
//!
//! # Design Decisions
//! - Per-instance circuit breaker keyed by instance id
//! - `current_state` is a pure function of the stored state and the time
//! - `next_retry_at` is set exactly when the breaker is open

use std::fmt;
use std::time::{Duration, SystemTime};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Breaker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// A state change produced by a read or a recorded outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Stored breaker state for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub state: CircuitState,
    /// Consecutive failure count.
    pub failures: u32,
    pub last_failure: Option<SystemTime>,
    /// Only set while `state == Open`.
    pub next_retry_at: Option<SystemTime>,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self::closed()
    }
}

/// Effective state at `now`, applying the lazy open → half-open rule.
pub fn current_state(breaker: &CircuitBreakerState, now: SystemTime) -> CircuitState {
    match (breaker.state, breaker.next_retry_at) {
        (CircuitState::Open, Some(retry_at)) if now >= retry_at => CircuitState::HalfOpen,
        (state, _) => state,
    }
}

impl CircuitBreakerState {
    pub fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            last_failure: None,
            next_retry_at: None,
        }
    }

    /// Persist the result of `current_state`.
    pub fn refresh(&mut self, now: SystemTime) -> Option<Transition> {
        let effective = current_state(self, now);
        if effective == self.state {
            return None;
        }
        let from = self.state;
        self.state = effective;
        self.next_retry_at = None;
        Some(Transition { from, to: effective })
    }

    /// Apply a successful request outcome.
    pub fn on_success(&mut self, now: SystemTime) -> Option<Transition> {
        let refreshed = self.refresh(now);
        self.failures = 0;
        if self.state == CircuitState::HalfOpen {
            self.state = CircuitState::Closed;
            self.next_retry_at = None;
            return Some(Transition {
                from: CircuitState::HalfOpen,
                to: CircuitState::Closed,
            });
        }
        refreshed
    }

    /// Apply a failed request outcome.
    pub fn on_failure(&mut self, now: SystemTime, config: &CircuitBreakerConfig) -> Option<Transition> {
        let refreshed = self.refresh(now);

        if self.state == CircuitState::Closed && config.monitoring_period_ms > 0 {
            let window = Duration::from_millis(config.monitoring_period_ms);
            let stale = self
                .last_failure
                .and_then(|last| now.duration_since(last).ok())
                .is_some_and(|elapsed| elapsed > window);
            if stale {
                self.failures = 0;
            }
        }

        self.failures = self.failures.saturating_add(1);
        self.last_failure = Some(now);

        let trips = match self.state {
            CircuitState::HalfOpen => true,
            _ => self.failures >= config.failure_threshold,
        };
        if !trips {
            return refreshed;
        }

        let from = self.state;
        self.state = CircuitState::Open;
        self.next_retry_at = Some(now + Duration::from_millis(config.recovery_timeout_ms));
        if from == CircuitState::Open {
            // Still open; the retry deadline moved.
            return refreshed;
        }
        Some(Transition { from, to: CircuitState::Open })
    }
}

/// Breaker states for every instance id.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, CircuitBreakerState>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a closed breaker for `id`, replacing any existing state.
    pub fn reset(&self, id: &str) {
        self.breakers.insert(id.to_string(), CircuitBreakerState::closed());
    }

    pub fn remove(&self, id: &str) {
        self.breakers.remove(id);
    }

    /// Effective state for `id`, creating a closed breaker if none exists.
    pub fn state_of(&self, id: &str, now: SystemTime) -> CircuitState {
        let mut entry = self.breakers.entry(id.to_string()).or_default();
        if let Some(transition) = entry.refresh(now) {
            log_transition(id, transition);
        }
        entry.state
    }

    /// Record a request outcome against `id`'s breaker.
    pub fn record(
        &self,
        id: &str,
        success: bool,
        now: SystemTime,
        config: &CircuitBreakerConfig,
    ) -> Option<Transition> {
        let mut entry = self.breakers.entry(id.to_string()).or_default();
        let transition = if success {
            entry.on_success(now)
        } else {
            entry.on_failure(now, config)
        };
        if let Some(transition) = transition {
            log_transition(id, transition);
        }
        transition
    }

    /// Copy of the stored state (without applying the lazy transition).
    pub fn snapshot(&self, id: &str) -> Option<CircuitBreakerState> {
        self.breakers.get(id).map(|b| b.value().clone())
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

fn log_transition(id: &str, transition: Transition) {
    match transition.to {
        CircuitState::Open => tracing::warn!(
            instance = %id,
            from = %transition.from,
            "Circuit breaker opened"
        ),
        _ => tracing::info!(
            instance = %id,
            from = %transition.from,
            to = %transition.to,
            "Circuit breaker state changed"
        ),
    }
    metrics::record_breaker_transition(id, transition.to);
}
