//! In-process messaging server.
//!
//! A small namespace-partitioned event hub implementing the
//! [`MessagingServer`](crate::socket::MessagingServer) surface. It backs the
//! demo binary and the tests; it is not a transport.
//!
//! ```text
//! Hub ──┬── "/"      HubNamespace ── sockets, connect hooks
//!       └── "/chat"  HubNamespace ── sockets, connect hooks
//! ```

mod namespace;
mod socket;

pub use namespace::HubNamespace;
pub use socket::{EventHandler, HubSocket, OutboundFrame, SocketHandle};

use crate::socket::{MessagingServer, Namespace};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Name of the namespace every hub starts with.
pub const ROOT_NAMESPACE: &str = "/";

/// Namespace-partitioned event hub.
pub struct Hub {
    namespaces: DashMap<String, Arc<HubNamespace>>,
    /// Live sessions across all namespaces.
    clients: Arc<AtomicUsize>,
}

impl Hub {
    /// Create a hub with the root namespace.
    pub fn new() -> Arc<Self> {
        let hub = Arc::new(Self {
            namespaces: DashMap::new(),
            clients: Arc::new(AtomicUsize::new(0)),
        });
        hub.of(ROOT_NAMESPACE);
        hub
    }

    /// Get or create a namespace.
    pub fn of(&self, name: &str) -> Arc<HubNamespace> {
        self.namespaces
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(namespace = %name, "Namespace created");
                Arc::new(HubNamespace::new(name.to_string(), Arc::clone(&self.clients)))
            })
            .value()
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<HubNamespace>> {
        self.namespaces.get(name).map(|n| n.value().clone())
    }

    /// Disconnect every socket in every namespace.
    pub fn close(&self) {
        let namespaces: Vec<Arc<HubNamespace>> =
            self.namespaces.iter().map(|n| n.value().clone()).collect();
        for ns in namespaces {
            ns.disconnect_all();
        }
    }
}

impl MessagingServer for Hub {
    fn namespace_names(&self) -> Vec<String> {
        self.namespaces.iter().map(|n| n.key().clone()).collect()
    }

    fn namespace(&self, name: &str) -> Option<Arc<dyn Namespace>> {
        self.get(name).map(|ns| ns as Arc<dyn Namespace>)
    }

    fn clients_count(&self) -> usize {
        self.clients.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::{Connection, DisconnectReason, EventPacket, Payload};

    #[test]
    fn root_namespace_exists() {
        let hub = Hub::new();
        assert_eq!(hub.namespace_names(), vec![ROOT_NAMESPACE]);
        assert!(hub.namespace("/").is_some());
        assert!(hub.namespace("/missing").is_none());
    }

    #[test]
    fn of_is_get_or_create() {
        let hub = Hub::new();
        let a = hub.of("/chat");
        let b = hub.of("/chat");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(hub.namespace_names().len(), 2);
    }

    #[test]
    fn clients_count_spans_namespaces() {
        let hub = Hub::new();
        let s1 = hub.of("/").connect();
        let s2 = hub.of("/chat").connect();
        assert_eq!(hub.clients_count(), 2);

        s1.disconnect(DisconnectReason::ClientDisconnect);
        assert_eq!(hub.clients_count(), 1);
        drop(s2);
        assert_eq!(hub.clients_count(), 0);
    }

    #[tokio::test]
    async fn emit_reaches_outbound_queue() {
        let hub = Hub::new();
        let mut socket = hub.of("/").connect();
        socket.emit("chat", &[Payload::from("hi")]).unwrap();
        let frame = socket.recv().await.unwrap();
        assert_eq!(frame.event, "chat");
        assert_eq!(frame.args, vec![Payload::from("hi")]);
    }

    #[test]
    fn handlers_receive_delivered_packets() {
        let hub = Hub::new();
        let socket = hub.of("/").connect();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        socket.on("msg", move |p: &EventPacket| sink.lock().push(p.clone()));

        socket.deliver(EventPacket::single("msg", "a"));
        socket.deliver(EventPacket::single("other", "b"));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn close_disconnects_everyone() {
        let hub = Hub::new();
        let a = hub.of("/").connect();
        let _b = hub.of("/x").connect();
        assert_eq!(hub.of("/").socket_count(), 1);
        hub.close();
        assert_eq!(hub.clients_count(), 0);
        assert_eq!(hub.of("/").socket_count(), 0);
        assert_eq!(hub.of("/x").socket_count(), 0);
        assert!(a.emit("late", &[]).is_err());
    }

    #[test]
    fn listener_added_after_close_fires_immediately() {
        let hub = Hub::new();
        let socket = hub.of("/").connect();
        socket.disconnect(DisconnectReason::ServerDisconnect);

        let fired = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        socket
            .connection()
            .on_disconnect(Box::new(move |reason| sink.lock().push(reason)));
        assert_eq!(fired.lock().as_slice(), &[DisconnectReason::ServerDisconnect]);

        // A second disconnect neither changes the reason nor re-fires
        socket.disconnect(DisconnectReason::ClientDisconnect);
        assert_eq!(fired.lock().len(), 1);
    }
}
