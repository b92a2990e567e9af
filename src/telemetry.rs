//! Tracing setup and span constructors.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, honoring `RUST_LOG` (default `info`).
///
/// `json` switches to line-delimited JSON output.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Standardized span constructors for socket observability.
pub mod spans {
    use tracing::{Span, debug_span, info_span};

    /// Span for binding one namespace.
    pub fn namespace(name: &str) -> Span {
        info_span!("namespace", name = %name)
    }

    /// Span for a single socket.
    pub fn connection(id: &str, namespace: &str) -> Span {
        debug_span!("socket", id = %id, namespace = %namespace)
    }

    /// Span for the background discovery task.
    pub fn discovery(interval_ms: u64) -> Span {
        debug_span!("discovery", interval_ms)
    }
}
