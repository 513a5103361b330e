//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! get_available_instance(client_ip)
//!     → registry.rs (instances with status = healthy)
//!     → resilience::circuit_breaker (drop instances whose breaker is open)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through candidates)
//!         - weighted.rs (random, proportional to weight)
//!         - least_conn.rs (pick candidate with fewest connections)
//!         - ip_hash.rs (stable candidate per client IP)
//!     → Return a copy of the instance, or None when nothing qualifies
//!
//! record_request(id, success, latency)
//!     → update response time
//!     → drive the instance's circuit breaker
//! ```
//!
//! # Design Decisions
//! - Selectors only see the filtered candidate list; filtering lives in the balancer
//! - Selection never mutates connection counts; callers bracket calls with
//!   start_connection / end_connection
//! - A half-open breaker is eligible so trial traffic can reach the instance

pub mod balancer;
pub mod ip_hash;
pub mod least_conn;
pub mod round_robin;
pub mod stats;
pub mod weighted;

use std::fmt::Debug;
use crate::config::Algorithm;
use crate::instance::ServiceInstance;

pub use balancer::LoadBalancer;
pub use stats::{InstanceSummary, LoadBalancerStats};

/// An instance selection algorithm.
pub trait Selector: Send + Sync + Debug {
    /// Pick one of `candidates`, or `None` if the slice is empty.
    fn next_instance<'a>(
        &self,
        candidates: &'a [ServiceInstance],
        client_ip: Option<&str>,
    ) -> Option<&'a ServiceInstance>;
}

/// Build the selector for a configured algorithm.
pub fn selector_for(algorithm: Algorithm) -> Box<dyn Selector> {
    match algorithm {
        Algorithm::RoundRobin => Box::new(round_robin::RoundRobin::new()),
        Algorithm::Weighted => Box::new(weighted::Weighted::new()),
        Algorithm::LeastConnections => Box::new(least_conn::LeastConnections::new()),
        Algorithm::IpHash => Box::new(ip_hash::IpHash::new()),
    }
}
