//! Per-connection instrumentation.
//!
//! [`InstrumentedConnection`] decorates a connection: it implements the same
//! [`Connection`] surface, records metrics, then forwards every call to the
//! wrapped connection with identical arguments and returns its result as-is.

use crate::bytes;
use crate::error::TransportError;
use crate::metrics::SocketMetrics;
use crate::socket::{
    ConnectHook, Connection, DisconnectListener, EventPacket, MessagingServer, Payload,
};
use prometheus::IntCounterVec;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Protocol and lifecycle events that never get per-event metrics.
pub const BLACKLISTED_EVENTS: [&str; 6] = [
    "error",
    "connect",
    "disconnect",
    "disconnecting",
    "newListener",
    "removeListener",
];

#[inline]
pub fn is_blacklisted(event: &str) -> bool {
    BLACKLISTED_EVENTS.contains(&event)
}

/// Metric updates for one namespace.
///
/// Label lookups go through `get_metric_with_label_values` so a cardinality
/// mismatch is logged instead of panicking inside the delivery path.
#[derive(Clone)]
struct Recorder {
    namespace: String,
    metrics: Arc<SocketMetrics>,
    server: Weak<dyn MessagingServer>,
}

impl Recorder {
    fn refresh_connected(&self) {
        // Server already gone: keep the last reading
        if let Some(server) = self.server.upgrade() {
            let count = i64::try_from(server.clients_count()).unwrap_or(i64::MAX);
            self.metrics.connected.set(count);
        }
    }

    fn inc(&self, counter: &IntCounterVec, event: Option<&str>, by: u64) {
        let result = match event {
            Some(event) => counter.get_metric_with_label_values(&[event, self.namespace.as_str()]),
            None => counter.get_metric_with_label_values(&[self.namespace.as_str()]),
        };
        match result {
            Ok(c) => c.inc_by(by),
            Err(e) => debug!(namespace = %self.namespace, error = %e, "Dropped metric update"),
        }
    }

    fn record_connect(&self) {
        self.inc(&self.metrics.connects_total, None, 1);
        self.refresh_connected();
    }

    fn record_disconnect(&self) {
        self.inc(&self.metrics.disconnects_total, None, 1);
        self.refresh_connected();
    }

    fn record_error(&self) {
        self.refresh_connected();
        self.inc(&self.metrics.errors_total, None, 1);
    }

    fn record_sent(&self, event: &str, args: &[Payload]) {
        if is_blacklisted(event) {
            return;
        }
        self.inc(&self.metrics.events_sent_total, Some(event), 1);
        self.inc(&self.metrics.bytes_sent_total, Some(event), bytes::args_size(args));
    }

    fn record_received(&self, packet: &EventPacket) {
        if packet.event == "error" {
            self.record_error();
        } else if !is_blacklisted(&packet.event) {
            let event = Some(packet.event.as_str());
            self.inc(&self.metrics.events_received_total, event, 1);
            self.inc(
                &self.metrics.bytes_received_total,
                event,
                bytes::args_size(&packet.args),
            );
        }
    }
}

/// A connection wrapped with metric side effects.
pub struct InstrumentedConnection {
    inner: Arc<dyn Connection>,
    recorder: Recorder,
}

impl InstrumentedConnection {
    /// Wrap `inner`, counting the connect and subscribing to its disconnect.
    pub fn install(
        inner: Arc<dyn Connection>,
        metrics: Arc<SocketMetrics>,
        server: Weak<dyn MessagingServer>,
    ) -> Arc<Self> {
        let recorder = Recorder {
            namespace: inner.namespace().to_string(),
            metrics,
            server,
        };
        recorder.record_connect();

        let on_disconnect = recorder.clone();
        let id = inner.id().to_string();
        inner.on_disconnect(Box::new(move |reason| {
            debug!(id = %id, namespace = %on_disconnect.namespace, reason = %reason, "Socket disconnected");
            on_disconnect.record_disconnect();
        }));

        Arc::new(Self { inner, recorder })
    }
}

impl Connection for InstrumentedConnection {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn namespace(&self) -> &str {
        self.inner.namespace()
    }

    fn emit(&self, event: &str, args: &[Payload]) -> Result<(), TransportError> {
        self.recorder.record_sent(event, args);
        self.inner.emit(event, args)
    }

    fn dispatch(&self, packet: EventPacket) {
        self.recorder.record_received(&packet);
        self.inner.dispatch(packet);
    }

    fn on_disconnect(&self, listener: DisconnectListener) {
        self.inner.on_disconnect(listener);
    }
}

/// Namespace hook that instruments every new connection.
pub struct InstrumentHook {
    metrics: Arc<SocketMetrics>,
    server: Weak<dyn MessagingServer>,
}

impl InstrumentHook {
    pub fn new(metrics: Arc<SocketMetrics>, server: Weak<dyn MessagingServer>) -> Self {
        Self { metrics, server }
    }
}

impl ConnectHook for InstrumentHook {
    fn on_connect(&self, conn: Arc<dyn Connection>) -> Arc<dyn Connection> {
        let _span = crate::telemetry::spans::connection(conn.id(), conn.namespace()).entered();
        debug!("Instrumenting socket");
        InstrumentedConnection::install(conn, Arc::clone(&self.metrics), self.server.clone())
    }
}
