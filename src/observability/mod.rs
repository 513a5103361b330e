//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Balancer, breakers, health checker, discovery produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - State transitions are logged once, repeated identical results stay quiet
//! - Metrics are cheap and safe to record with no exporter installed

pub mod logging;
pub mod metrics;
