//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! checker.rs:
//!     Periodic timer (interval_ms, first tick immediate)
//!     → snapshot registered instances
//!     → probe.rs: GET http://{host}:{port}{path} per instance, concurrently
//!         - bounded by timeout_ms, abandoned on expiry
//!         - up to 1 + retries attempts with jittered backoff
//!     → 2xx: healthy, anything else: unhealthy
//!     → write status / last_check / response_time back to the registry
//! ```
//!
//! # Design Decisions
//! - Probe errors never escape the checker; they become an unhealthy status
//! - Only status changes are logged at info/warn
//! - Draining instances are probed but keep their draining status
//! - The loop stops on a broadcast shutdown signal, including mid-tick

pub mod checker;
pub mod probe;

pub use checker::{HealthCheckHandle, HealthChecker};
pub use probe::{ProbeError, ProbeOutcome, Prober};
