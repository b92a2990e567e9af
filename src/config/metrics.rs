//! Collector options.

use super::defaults::{
    default_discovery_interval_ms, default_path, default_port, default_prefix, default_true,
};
use prometheus::Registry;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Options for [`SocketIoMetrics`](crate::SocketIoMetrics).
///
/// Deserializable from the `[metrics]` table of a config file; the registry
/// can only be supplied in code via [`MetricsOptions::with_registry`].
#[derive(Clone, Deserialize)]
pub struct MetricsOptions {
    /// Metric name prefix (default: "socket_io"). Empty means no prefix.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Periodically rescan for namespaces created after startup (default: true).
    #[serde(default = "default_true")]
    pub check_for_new_namespaces: bool,
    /// Milliseconds between namespace scans (default: 2000).
    #[serde(default = "default_discovery_interval_ms")]
    pub discovery_interval_ms: u64,
    /// Also export process metrics (cpu, memory, fds) (default: false).
    #[serde(default)]
    pub collect_default_metrics: bool,
    /// Serve the registry over HTTP (default: false).
    #[serde(default)]
    pub create_server: bool,
    /// HTTP port for the metrics endpoint (default: 9090, 0 picks a free port).
    #[serde(default = "default_port")]
    pub port: u16,
    /// HTTP path of the metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
    /// Target registry; the process-wide default when `None`.
    #[serde(skip)]
    pub registry: Option<Registry>,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            check_for_new_namespaces: true,
            discovery_interval_ms: default_discovery_interval_ms(),
            collect_default_metrics: false,
            create_server: false,
            port: default_port(),
            path: default_path(),
            registry: None,
        }
    }
}

impl MetricsOptions {
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }
}

impl fmt::Debug for MetricsOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsOptions")
            .field("prefix", &self.prefix)
            .field("check_for_new_namespaces", &self.check_for_new_namespaces)
            .field("discovery_interval_ms", &self.discovery_interval_ms)
            .field("collect_default_metrics", &self.collect_default_metrics)
            .field("create_server", &self.create_server)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("custom_registry", &self.registry.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_matches_default() {
        let opts: MetricsOptions = toml::from_str("").unwrap();
        let def = MetricsOptions::default();
        assert_eq!(opts.prefix, def.prefix);
        assert_eq!(opts.check_for_new_namespaces, def.check_for_new_namespaces);
        assert_eq!(opts.discovery_interval_ms, 2000);
        assert!(!opts.collect_default_metrics);
        assert_eq!(opts.path, "/metrics");
        assert!(opts.registry.is_none());
    }

    #[test]
    fn overrides_apply() {
        let opts: MetricsOptions = toml::from_str(
            r#"
            prefix = "chat"
            check_for_new_namespaces = false
            discovery_interval_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(opts.prefix, "chat");
        assert!(!opts.check_for_new_namespaces);
        assert_eq!(opts.discovery_interval(), Duration::from_millis(250));
    }
}
