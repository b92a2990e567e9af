//! socketio-metrics - Prometheus metrics for namespace-partitioned socket servers.
//!
//! Instruments every connection of every namespace of a messaging server and
//! counts connects, disconnects, errors, events and payload bytes.
//!
//! ```no_run
//! use socketio_metrics::{MetricsOptions, collect, hub::Hub};
//!
//! # async fn run() -> Result<(), socketio_metrics::MetricsError> {
//! let hub = Hub::new();
//! let metrics = collect(hub.clone(), MetricsOptions::default()).await?;
//! println!("{}", metrics.render_text());
//! # Ok(())
//! # }
//! ```

pub mod binder;
pub mod bytes;
mod collector;
pub mod config;
pub mod error;
pub mod http;
pub mod hub;
pub mod instrument;
pub mod metrics;
pub mod socket;
pub mod telemetry;

pub use binder::{DiscoveryHandle, NamespaceBinder};
pub use collector::{SocketIoMetrics, collect};
pub use config::MetricsOptions;
pub use error::{MetricsError, MetricsResult, TransportError};
pub use instrument::{InstrumentHook, InstrumentedConnection};
pub use metrics::{ExpositionFormat, SocketMetrics};
pub use socket::{
    ConnectHook, Connection, DisconnectReason, EventPacket, MessagingServer, Namespace, Payload,
};
