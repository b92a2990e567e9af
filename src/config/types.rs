//! Demo binary config file.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::defaults::{
    default_late_namespace_delay_ms, default_namespaces, default_traffic_interval_ms,
};
use super::metrics::MetricsOptions;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level config file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Collector options.
    #[serde(default)]
    pub metrics: MetricsOptions,
    /// Synthetic traffic settings.
    #[serde(default)]
    pub demo: DemoConfig,
    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub json_logs: bool,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Synthetic traffic generator settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    /// Namespaces created at startup (default: ["/"]).
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,
    /// Namespace created after startup to exercise discovery.
    #[serde(default)]
    pub late_namespace: Option<String>,
    /// Delay before the late namespace appears (default: 5000).
    #[serde(default = "default_late_namespace_delay_ms")]
    pub late_namespace_delay_ms: u64,
    /// Milliseconds between simulated client actions (default: 500).
    #[serde(default = "default_traffic_interval_ms")]
    pub traffic_interval_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            namespaces: default_namespaces(),
            late_namespace: None,
            late_namespace_delay_ms: default_late_namespace_delay_ms(),
            traffic_interval_ms: default_traffic_interval_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            json_logs = true

            [metrics]
            prefix = "demo"
            create_server = true
            port = 9191

            [demo]
            namespaces = ["/", "/chat"]
            late_namespace = "/admin"
            "#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(config.json_logs);
        assert_eq!(config.metrics.prefix, "demo");
        assert!(config.metrics.create_server);
        assert_eq!(config.metrics.port, 9191);
        assert_eq!(config.demo.namespaces, vec!["/", "/chat"]);
        assert_eq!(config.demo.late_namespace.as_deref(), Some("/admin"));
        assert_eq!(config.demo.traffic_interval_ms, 500);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[metrics\nprefix = 1").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
