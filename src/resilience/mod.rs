//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request outcome reported by caller:
//!     → circuit_breaker.rs (count failures, open/half-open/close)
//!     → balancer excludes open breakers from selection
//!
//! Health probe fails:
//!     → backoff.rs (jittered delay before the next attempt in the same tick)
//! ```
//!
//! # Design Decisions
//! - Breaker transitions out of open are evaluated on read, never by a timer
//! - Jittered backoff keeps retried probes from arriving in lockstep

pub mod backoff;
pub mod circuit_breaker;

pub use circuit_breaker::{current_state, BreakerRegistry, CircuitBreakerState, CircuitState};
