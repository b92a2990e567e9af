//! Prometheus metric schema and exposition for socket servers.
//!
//! Every metric name is prefixed (default `socket_io`) so several instrumented
//! servers can share one registry:
//!
//! - `{prefix}_connected` - currently connected sessions (gauge)
//! - `{prefix}_connects_total{namespace}` / `{prefix}_disconnects_total{namespace}`
//! - `{prefix}_errors_total{namespace}`
//! - `{prefix}_events_received_total{event,namespace}` / `{prefix}_events_sent_total{event,namespace}`
//! - `{prefix}_bytes_received_total{event,namespace}` / `{prefix}_bytes_sent_total{event,namespace}`

use crate::error::{MetricsError, MetricsResult};
use prometheus::core::Collector;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, ProtobufEncoder, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry used when no registry is supplied.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn default_registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Default metric name prefix.
pub const DEFAULT_PREFIX: &str = "socket_io";

const NAMESPACE_LABELS: &[&str] = &["namespace"];
const EVENT_LABELS: &[&str] = &["event", "namespace"];

/// The instruments updated by connection instrumentation.
#[derive(Clone, Debug)]
pub struct SocketMetrics {
    /// Currently connected sessions, read from the server's live count.
    pub connected: IntGauge,
    pub connects_total: IntCounterVec,
    pub disconnects_total: IntCounterVec,
    pub errors_total: IntCounterVec,
    pub events_received_total: IntCounterVec,
    pub events_sent_total: IntCounterVec,
    pub bytes_received_total: IntCounterVec,
    pub bytes_sent_total: IntCounterVec,
}

/// Join `prefix` and `name` the way Opts namespaces do.
pub fn metric_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}_{name}")
    }
}

impl SocketMetrics {
    /// Create the instruments and register them into `registry`.
    ///
    /// Fails with [`MetricsError::AlreadyRegistered`] if any prefixed name is
    /// already taken. Instruments registered before the failure are removed
    /// again so a failed call leaves the registry untouched.
    pub fn register(registry: &Registry, prefix: &str) -> MetricsResult<Self> {
        let mut registered: Vec<Box<dyn Collector>> = Vec::with_capacity(8);

        let result = Self::register_all(registry, prefix, &mut registered);
        if result.is_err() {
            for collector in registered {
                if let Err(e) = registry.unregister(collector) {
                    tracing::warn!(error = %e, "Failed to roll back metric registration");
                }
            }
        }
        result
    }

    fn register_all(
        registry: &Registry,
        prefix: &str,
        registered: &mut Vec<Box<dyn Collector>>,
    ) -> MetricsResult<Self> {
        // Build, register, and remember each metric for rollback
        macro_rules! register {
            ($init:expr, $name:expr) => {{
                let name = metric_name(prefix, $name);
                let m = $init(name.as_str()).map_err(|e| MetricsError::registration(&name, e))?;
                registry
                    .register(Box::new(m.clone()))
                    .map_err(|e| MetricsError::registration(&name, e))?;
                registered.push(Box::new(m.clone()));
                m
            }};
        }

        let gauge = |help: &'static str| move |name: &str| IntGauge::new(name, help);
        let counter = |help: &'static str, labels: &'static [&'static str]| {
            move |name: &str| IntCounterVec::new(Opts::new(name, help), labels)
        };

        Ok(Self {
            connected: register!(gauge("Number of currently connected sockets"), "connected"),
            connects_total: register!(
                counter("Total count of socket connects", NAMESPACE_LABELS),
                "connects_total"
            ),
            disconnects_total: register!(
                counter("Total count of socket disconnects", NAMESPACE_LABELS),
                "disconnects_total"
            ),
            errors_total: register!(
                counter("Total count of socket errors", NAMESPACE_LABELS),
                "errors_total"
            ),
            events_received_total: register!(
                counter("Total count of events received", EVENT_LABELS),
                "events_received_total"
            ),
            events_sent_total: register!(
                counter("Total count of events sent", EVENT_LABELS),
                "events_sent_total"
            ),
            bytes_received_total: register!(
                counter("Total bytes received", EVENT_LABELS),
                "bytes_received_total"
            ),
            bytes_sent_total: register!(
                counter("Total bytes sent", EVENT_LABELS),
                "bytes_sent_total"
            ),
        })
    }

    /// Remove every instrument from `registry`.
    pub fn unregister(&self, registry: &Registry) {
        let collectors: [Box<dyn Collector>; 8] = [
            Box::new(self.connected.clone()),
            Box::new(self.connects_total.clone()),
            Box::new(self.disconnects_total.clone()),
            Box::new(self.errors_total.clone()),
            Box::new(self.events_received_total.clone()),
            Box::new(self.events_sent_total.clone()),
            Box::new(self.bytes_received_total.clone()),
            Box::new(self.bytes_sent_total.clone()),
        ];
        for collector in collectors {
            if let Err(e) = registry.unregister(collector) {
                tracing::warn!(error = %e, "Failed to unregister metric");
            }
        }
    }
}

/// Register process-level metrics (cpu, memory, fds) under `prefix`.
#[cfg(target_os = "linux")]
pub fn register_process_metrics(registry: &Registry, prefix: &str) -> MetricsResult<()> {
    use prometheus::process_collector::ProcessCollector;

    let collector = ProcessCollector::new(std::process::id() as i32, prefix);
    registry
        .register(Box::new(collector))
        .map_err(|e| MetricsError::registration(&metric_name(prefix, "process"), e))
}

#[cfg(not(target_os = "linux"))]
pub fn register_process_metrics(_registry: &Registry, _prefix: &str) -> MetricsResult<()> {
    tracing::warn!("Process metrics are only available on Linux");
    Ok(())
}

/// Undo [`register_process_metrics`] for the same `prefix`.
#[cfg(target_os = "linux")]
pub fn unregister_process_metrics(registry: &Registry, prefix: &str) {
    use prometheus::process_collector::ProcessCollector;

    // Unregistration matches on descriptors, so a fresh collector will do
    let collector = ProcessCollector::new(std::process::id() as i32, prefix);
    if let Err(e) = registry.unregister(Box::new(collector)) {
        tracing::warn!(error = %e, "Failed to unregister process metrics");
    }
}

#[cfg(not(target_os = "linux"))]
pub fn unregister_process_metrics(_registry: &Registry, _prefix: &str) {}

// ========================================================================
// Exposition
// ========================================================================

/// Output format of a scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpositionFormat {
    #[default]
    Text,
    Protobuf,
}

impl ExpositionFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Text => prometheus::TEXT_FORMAT,
            Self::Protobuf => prometheus::PROTOBUF_FORMAT,
        }
    }

    /// Pick a format from an HTTP `Accept` header.
    pub fn negotiate(accept: Option<&str>) -> Self {
        match accept {
            Some(a) if a.contains("application/vnd.google.protobuf") => Self::Protobuf,
            _ => Self::Text,
        }
    }
}

/// Gather all families in `registry` and encode them as `format`.
pub fn render(registry: &Registry, format: ExpositionFormat) -> MetricsResult<Vec<u8>> {
    let families = registry.gather();
    let mut buffer = Vec::new();
    match format {
        ExpositionFormat::Text => TextEncoder::new().encode(&families, &mut buffer)?,
        ExpositionFormat::Protobuf => ProtobufEncoder::new().encode(&families, &mut buffer)?,
    }
    Ok(buffer)
}

/// Text exposition of `registry`; encoding failures are logged and yield "".
pub fn render_text(registry: &Registry) -> String {
    let buffer = match render(registry, ExpositionFormat::Text) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            return String::new();
        }
    };
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}
