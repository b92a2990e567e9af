//! Unified error handling for socketio-metrics.
//!
//! Only construction-time failures surface as errors. The interception path
//! never returns a metrics error to the wrapped connection.

use crate::config::validation::ValidationError;
use std::net::SocketAddr;
use thiserror::Error;

// ============================================================================
// Metrics Errors (startup / exposition)
// ============================================================================

/// Errors raised while registering or exposing metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A metric with the same fully-qualified name already lives in the registry.
    #[error("metric already registered: {name}")]
    AlreadyRegistered { name: String },

    #[error("failed to register metric {name}: {source}")]
    Registration {
        name: String,
        #[source]
        source: prometheus::Error,
    },

    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),

    /// Options rejected before anything was registered or bound.
    #[error("invalid metrics options: {}", join_errors(.0))]
    InvalidOptions(Vec<ValidationError>),

    #[error("invalid metrics path: {0:?} (must start with '/')")]
    InvalidPath(String),

    #[error("failed to bind metrics endpoint on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

impl MetricsError {
    /// Map a prometheus registration error for `name` into our taxonomy.
    pub(crate) fn registration(name: &str, err: prometheus::Error) -> Self {
        match err {
            prometheus::Error::AlreadyReg => Self::AlreadyRegistered {
                name: name.to_string(),
            },
            source => Self::Registration {
                name: name.to_string(),
                source,
            },
        }
    }

    /// Whether this error stems from a bad configuration (fatal at startup).
    #[inline]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRegistered { .. }
                | Self::Registration { .. }
                | Self::InvalidOptions(_)
                | Self::InvalidPath(_)
        )
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for metrics setup.
pub type MetricsResult<T> = Result<T, MetricsError>;

// ============================================================================
// Transport Errors (collaborator surface)
// ============================================================================

/// Failure reported by a connection's outbound send.
///
/// Instrumentation returns these verbatim from the wrapped connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("send buffer full")]
    Backpressure,

    #[error("transport error: {0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_reg_maps_to_configuration_error() {
        let err = MetricsError::registration("socket_io_connected", prometheus::Error::AlreadyReg);
        assert!(matches!(err, MetricsError::AlreadyRegistered { ref name } if name == "socket_io_connected"));
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "metric already registered: socket_io_connected");
    }

    #[test]
    fn other_registration_errors_keep_source() {
        let err = MetricsError::registration(
            "x",
            prometheus::Error::Msg("inconsistent help".to_string()),
        );
        assert!(matches!(err, MetricsError::Registration { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn invalid_options_lists_every_problem() {
        let err = MetricsError::InvalidOptions(vec![
            ValidationError::ZeroInterval,
            ValidationError::InvalidPath("metrics".to_string()),
        ]);
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "invalid metrics options: metrics.discovery_interval_ms must be greater than 0; \
             metrics.path must start with '/', got 'metrics'"
        );
    }

    #[test]
    fn encode_error_is_not_configuration() {
        let err = MetricsError::from(prometheus::Error::Msg("boom".to_string()));
        assert!(!err.is_configuration());
    }
}
