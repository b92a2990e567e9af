//! Hub sockets and the handle given to whoever opened them.

use super::namespace::HubNamespace;
use crate::error::TransportError;
use crate::socket::{Connection, DisconnectListener, DisconnectReason, EventPacket, Namespace, Payload};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::debug;

/// Application handler for one inbound event name.
pub type EventHandler = Arc<dyn Fn(&EventPacket) + Send + Sync>;

/// An event on its way to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundFrame {
    pub event: String,
    pub args: Vec<Payload>,
}

/// Open with pending disconnect listeners, or closed for a reason.
enum Lifecycle {
    Open(Vec<DisconnectListener>),
    Closed(DisconnectReason),
}

/// The undecorated hub connection.
pub struct HubSocket {
    id: String,
    namespace: String,
    owner: Weak<HubNamespace>,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
    lifecycle: Mutex<Lifecycle>,
}

impl HubSocket {
    pub(super) fn new(
        id: String,
        owner: Weak<HubNamespace>,
        outbound: mpsc::UnboundedSender<OutboundFrame>,
    ) -> Self {
        let namespace = owner
            .upgrade()
            .map(|ns| ns.name().to_string())
            .unwrap_or_default();
        Self {
            id,
            namespace,
            owner,
            outbound,
            handlers: Mutex::new(HashMap::new()),
            lifecycle: Mutex::new(Lifecycle::Open(Vec::new())),
        }
    }

    pub fn on(&self, event: &str, handler: EventHandler) {
        self.handlers
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Open(_))
    }

    /// Tear the socket down. Later calls are no-ops.
    pub fn disconnect(&self, reason: DisconnectReason) {
        let listeners = {
            let mut lifecycle = self.lifecycle.lock();
            let listeners = match std::mem::replace(&mut *lifecycle, Lifecycle::Closed(reason)) {
                Lifecycle::Open(listeners) => listeners,
                closed @ Lifecycle::Closed(_) => {
                    *lifecycle = closed;
                    return;
                }
            };
            // Late listeners fire straight away, so the count must already be down
            if let Some(ns) = self.owner.upgrade() {
                ns.release(&self.id);
            }
            listeners
        };
        // Handlers may hold the decorated connection; break the cycle
        self.handlers.lock().clear();

        debug!(id = %self.id, reason = %reason, listeners = listeners.len(), "Socket closed");
        for listener in listeners {
            listener(reason);
        }
    }
}

impl Connection for HubSocket {
    fn id(&self) -> &str {
        &self.id
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn emit(&self, event: &str, args: &[Payload]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(OutboundFrame {
                event: event.to_string(),
                args: args.to_vec(),
            })
            .map_err(|_| TransportError::Closed)
    }

    fn dispatch(&self, packet: EventPacket) {
        let handlers = self
            .handlers
            .lock()
            .get(&packet.event)
            .cloned()
            .unwrap_or_default();
        for handler in handlers {
            handler(&packet);
        }
    }

    /// Fires immediately if the socket is already closed.
    fn on_disconnect(&self, listener: DisconnectListener) {
        let mut lifecycle = self.lifecycle.lock();
        let reason = match &mut *lifecycle {
            Lifecycle::Open(listeners) => {
                listeners.push(listener);
                return;
            }
            Lifecycle::Closed(reason) => *reason,
        };
        drop(lifecycle);
        listener(reason);
    }
}

/// Owner's view of a connected socket.
///
/// Emits and deliveries go through the hook-decorated connection, exactly
/// as the server itself would route them. Dropping the handle closes the
/// socket.
pub struct SocketHandle {
    conn: Arc<dyn Connection>,
    raw: Arc<HubSocket>,
    outbound: mpsc::UnboundedReceiver<OutboundFrame>,
}

impl SocketHandle {
    pub(super) fn new(
        conn: Arc<dyn Connection>,
        raw: Arc<HubSocket>,
        outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    ) -> Self {
        Self { conn, raw, outbound }
    }

    pub fn id(&self) -> &str {
        self.raw.id()
    }

    /// The decorated connection.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.conn
    }

    /// Server to client.
    pub fn emit(&self, event: &str, args: &[Payload]) -> Result<(), TransportError> {
        self.conn.emit(event, args)
    }

    /// Client to server.
    pub fn deliver(&self, packet: EventPacket) {
        self.conn.dispatch(packet);
    }

    pub fn on<F>(&self, event: &str, handler: F)
    where
        F: Fn(&EventPacket) + Send + Sync + 'static,
    {
        self.raw.on(event, Arc::new(handler));
    }

    pub fn disconnect(&self, reason: DisconnectReason) {
        self.raw.disconnect(reason);
    }

    pub fn is_connected(&self) -> bool {
        self.raw.is_connected()
    }

    pub async fn recv(&mut self) -> Option<OutboundFrame> {
        self.outbound.recv().await
    }

    pub fn try_recv(&mut self) -> Option<OutboundFrame> {
        self.outbound.try_recv().ok()
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        self.raw.disconnect(DisconnectReason::TransportClose);
    }
}
