//! Hub namespace: socket set plus connect hooks.

use super::socket::{HubSocket, SocketHandle};
use crate::socket::{ConnectHook, Connection, Namespace};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use uuid::Uuid;

/// One namespace of a [`Hub`](super::Hub).
pub struct HubNamespace {
    name: String,
    hooks: RwLock<Vec<Arc<dyn ConnectHook>>>,
    sockets: DashMap<String, Arc<HubSocket>>,
    clients: Arc<AtomicUsize>,
}

impl HubNamespace {
    pub(super) fn new(name: String, clients: Arc<AtomicUsize>) -> Self {
        Self {
            name,
            hooks: RwLock::new(Vec::new()),
            sockets: DashMap::new(),
            clients,
        }
    }

    /// Establish a new socket, running every connect hook in attach order.
    pub fn connect(self: &Arc<Self>) -> SocketHandle {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let raw = Arc::new(HubSocket::new(id.clone(), Arc::downgrade(self), tx));

        // Count the session before hooks run so they see it live
        self.clients.fetch_add(1, Ordering::AcqRel);
        self.sockets.insert(id, Arc::clone(&raw));

        let hooks = self.hooks.read().clone();
        let mut conn: Arc<dyn Connection> = raw.clone();
        for hook in hooks {
            conn = hook.on_connect(conn);
        }

        SocketHandle::new(conn, raw, rx)
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.read().len()
    }

    /// Called by a socket exactly once when it disconnects.
    pub(super) fn release(&self, id: &str) {
        if self.sockets.remove(id).is_some() {
            self.clients.fetch_sub(1, Ordering::AcqRel);
        }
    }

    pub(super) fn disconnect_all(&self) {
        let sockets: Vec<Arc<HubSocket>> = self.sockets.iter().map(|s| s.value().clone()).collect();
        for socket in sockets {
            socket.disconnect(crate::socket::DisconnectReason::ServerDisconnect);
        }
    }
}

impl Namespace for HubNamespace {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_connect_hook(&self, hook: Arc<dyn ConnectHook>) {
        self.hooks.write().push(hook);
    }
}
