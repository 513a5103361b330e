//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, any subset of fields)
//!     → loader.rs (parse & deserialize over defaults)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → LoadBalancerConfig handed to the balancer
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the balancer is constructed
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    Algorithm, CircuitBreakerConfig, HealthCheckConfig, LoadBalancerConfig, ObservabilityConfig,
    RouterConfig,
};
pub use validation::ValidationError;
