//! Configuration for azscale
//!
//! Holds the optional user defaults: subscription, credential order,
//! management endpoint and long-running operation polling.

// Allow nested config module - this is intentional for the config subsystem
#![allow(clippy::module_inception)]

pub mod config;
pub mod error;

// Re-export main types for convenience
pub use config::{Config, DEFAULT_MANAGEMENT_ENDPOINT, WaitConfig};
pub use error::{ConfigError, Result};
