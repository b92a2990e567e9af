//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

use crate::metrics::DEFAULT_PREFIX;

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Metrics Defaults
// =============================================================================

pub fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

pub fn default_discovery_interval_ms() -> u64 {
    2000
}

pub fn default_port() -> u16 {
    9090
}

pub fn default_path() -> String {
    "/metrics".to_string()
}

// =============================================================================
// Demo Defaults
// =============================================================================

pub fn default_namespaces() -> Vec<String> {
    vec!["/".to_string()]
}

pub fn default_traffic_interval_ms() -> u64 {
    500
}

pub fn default_late_namespace_delay_ms() -> u64 {
    5000
}
