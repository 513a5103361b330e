//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_signal() resolves
//!
//! Shutdown (shutdown.rs):
//!     trigger() → health checker and stats loop exit → process returns
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
