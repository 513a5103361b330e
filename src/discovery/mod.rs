//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! register_service / deregister_service(name, ..)
//!     → registry.rs (update the name's instance list)
//!     → watch channel receives the new list
//!     → every callback for the name is invoked with the new list
//!
//! watch_service(name, cb) → cb(current list) immediately
//! subscribe(name)          → ServiceWatch::current() is the current list
//! ```

pub mod registry;

pub use registry::{global, ServiceDiscovery, ServiceWatch, WatchCallback, WatchError, WatchId};
