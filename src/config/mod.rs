//! Configuration loading and management.
//!
//! - [`metrics`]: collector options (`MetricsOptions`)
//! - [`types`]: demo binary config file (`Config`, `DemoConfig`)
//! - [`validation`]: startup checks

mod defaults;
mod metrics;
mod types;
pub mod validation;

pub use metrics::MetricsOptions;
pub use types::{Config, ConfigError, DemoConfig};
