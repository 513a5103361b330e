//! In-process traffic routing: load balancing, circuit breaking, active
//! health checks and a named service registry.

pub mod config;
pub mod discovery;
pub mod error;
pub mod health;
pub mod instance;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod registry;
pub mod resilience;
pub mod time;

pub use config::{Algorithm, LoadBalancerConfig, RouterConfig};
pub use discovery::ServiceDiscovery;
pub use error::{RouterError, RouterResult};
pub use instance::{InstanceSpec, InstanceStatus, ServiceInstance};
pub use lifecycle::Shutdown;
pub use load_balancer::{LoadBalancer, LoadBalancerStats};
