//! Configuration validation.
//!
//! Validates options at startup to catch common errors early.

use super::MetricsOptions;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("metrics.prefix must match [a-zA-Z_:][a-zA-Z0-9_:]*, got '{0}'")]
    InvalidPrefix(String),
    #[error("metrics.discovery_interval_ms must be greater than 0")]
    ZeroInterval,
    #[error("metrics.path must start with '/', got '{0}'")]
    InvalidPath(String),
}

/// Validate options, returning all errors found.
pub fn validate(options: &MetricsOptions) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !is_valid_prefix(&options.prefix) {
        errors.push(ValidationError::InvalidPrefix(options.prefix.clone()));
    }
    if options.check_for_new_namespaces && options.discovery_interval_ms == 0 {
        errors.push(ValidationError::ZeroInterval);
    }
    if options.create_server && !options.path.starts_with('/') {
        errors.push(ValidationError::InvalidPath(options.path.clone()));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Empty prefixes are allowed and mean "no prefix".
fn is_valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        None => true,
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        Some(_) => false,
    }
}
