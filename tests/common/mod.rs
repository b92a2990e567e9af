//! Integration test common infrastructure.
//!
//! Spawns an in-process hub with a collector bound to an isolated registry,
//! and reads counter values back out of it.

use prometheus::Registry;
use socketio_metrics::hub::Hub;
use socketio_metrics::{MetricsOptions, SocketIoMetrics, collect};
use std::sync::Arc;

/// A hub plus its collector.
pub struct TestHub {
    pub hub: Arc<Hub>,
    pub collector: SocketIoMetrics,
}

#[allow(dead_code)]
impl TestHub {
    /// Start with discovery disabled.
    pub async fn spawn() -> Self {
        Self::spawn_with(MetricsOptions {
            check_for_new_namespaces: false,
            ..Default::default()
        })
        .await
    }

    /// Start with `options`, always on a fresh registry.
    pub async fn spawn_with(options: MetricsOptions) -> Self {
        let hub = Hub::new();
        let collector = collect(hub.clone(), options.with_registry(Registry::new()))
            .await
            .expect("Failed to start collector");
        Self { hub, collector }
    }

    pub fn counter(&self, name: &str, labels: &[&str]) -> u64 {
        let m = self.collector.metrics();
        let vec = match name {
            "connects_total" => &m.connects_total,
            "disconnects_total" => &m.disconnects_total,
            "errors_total" => &m.errors_total,
            "events_sent_total" => &m.events_sent_total,
            "events_received_total" => &m.events_received_total,
            "bytes_sent_total" => &m.bytes_sent_total,
            "bytes_received_total" => &m.bytes_received_total,
            other => panic!("unknown counter {other}"),
        };
        vec.with_label_values(labels).get()
    }

    pub fn connected(&self) -> i64 {
        self.collector.metrics().connected.get()
    }
}
