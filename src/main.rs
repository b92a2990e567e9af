//! socketio-metrics-demo - runs an in-process hub with synthetic traffic and
//! exposes its metrics for scraping.

use socketio_metrics::config::{Config, DemoConfig, validation};
use socketio_metrics::hub::{Hub, SocketHandle};
use socketio_metrics::{DisconnectReason, EventPacket, Payload, collect, telemetry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path)?
    } else {
        Config::default()
    };

    telemetry::init_tracing(config.json_logs);

    if let Err(errors) = validation::validate(&config.metrics) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path);
    }

    info!(path = %config_path, options = ?config.metrics, "Starting socketio-metrics demo");

    let hub = Hub::new();
    for ns in &config.demo.namespaces {
        hub.of(ns);
    }

    let collector = collect(hub.clone(), config.metrics.clone()).await?;
    if let Some(addr) = collector.local_addr() {
        info!(%addr, path = %config.metrics.path, "Scrape endpoint ready");
    }

    for ns in &config.demo.namespaces {
        spawn_traffic(Arc::clone(&hub), ns.clone(), &config.demo);
    }

    if let Some(late) = config.demo.late_namespace.clone() {
        let hub = Arc::clone(&hub);
        let demo = config.demo.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(demo.late_namespace_delay_ms)).await;
            info!(namespace = %late, "Creating late namespace");
            hub.of(&late);
            spawn_traffic(hub, late, &demo);
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    hub.close();
    collector.close().await;
    Ok(())
}

/// Connect a few echo clients and keep them chatting, churning one per round.
fn spawn_traffic(hub: Arc<Hub>, namespace: String, demo: &DemoConfig) {
    let period = Duration::from_millis(demo.traffic_interval_ms.max(1));
    tokio::spawn(async move {
        let mut sockets: Vec<SocketHandle> = Vec::new();
        let mut ticker = tokio::time::interval(period);
        let mut round: u64 = 0;
        loop {
            ticker.tick().await;
            round += 1;

            if sockets.len() < 4 {
                sockets.push(echo_socket(&hub, &namespace));
            }

            for socket in &mut sockets {
                // Nobody reads the client side; drop acks
                while socket.try_recv().is_some() {}
                socket.deliver(EventPacket::single("chat", format!("hello #{round}")));
                socket.deliver(EventPacket::new(
                    "typing",
                    vec![Payload::Json(serde_json::json!({ "round": round }))],
                ));
            }

            if round % 10 == 0 {
                if let Some(s) = sockets.first() {
                    s.deliver(EventPacket::single("error", "simulated transport error"));
                }
                let gone = sockets.remove(0);
                gone.disconnect(DisconnectReason::ClientDisconnect);
            }
        }
    });
}

/// A socket that answers every `chat` with an `ack` carrying the same payload.
fn echo_socket(hub: &Hub, namespace: &str) -> SocketHandle {
    let socket = hub.of(namespace).connect();
    let conn = Arc::downgrade(socket.connection());
    socket.on("chat", move |packet: &EventPacket| {
        if let Some(conn) = conn.upgrade() {
            if let Err(e) = conn.emit("ack", &packet.args) {
                warn!(error = %e, "Echo failed");
            }
        }
    });
    socket
}
