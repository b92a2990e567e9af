//! Collaborator surface of the observed messaging server.
//!
//! A messaging server is split into namespaces; each namespace hosts many
//! connections. Instrumentation only ever talks to a server through these
//! traits, so any transport can be observed by implementing them.

use crate::bytes;
use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Opaque event payload carried by emits and inbound packets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Json(Value),
}

impl Payload {
    /// Estimated wire size in bytes. Never fails.
    pub fn byte_size(&self) -> u64 {
        match self {
            Self::Text(s) => s.len() as u64,
            Self::Json(v) => bytes::value_len(v),
        }
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

/// An event received from a client, before it reaches application handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPacket {
    pub event: String,
    pub args: Vec<Payload>,
}

impl EventPacket {
    pub fn new(event: impl Into<String>, args: Vec<Payload>) -> Self {
        Self {
            event: event.into(),
            args,
        }
    }

    /// Packet with a single argument.
    pub fn single(event: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Self::new(event, vec![payload.into()])
    }
}

/// Why a connection went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Client left the namespace.
    ClientDisconnect,
    /// Server kicked the client.
    ServerDisconnect,
    /// Underlying transport closed.
    TransportClose,
    TransportError,
    PingTimeout,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientDisconnect => "client namespace disconnect",
            Self::ServerDisconnect => "server namespace disconnect",
            Self::TransportClose => "transport close",
            Self::TransportError => "transport error",
            Self::PingTimeout => "ping timeout",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback fired once when a connection disconnects.
pub type DisconnectListener = Box<dyn FnOnce(DisconnectReason) + Send + 'static>;

/// One client session within a namespace.
pub trait Connection: Send + Sync {
    /// Session identifier, unique within the server.
    fn id(&self) -> &str;

    /// Namespace this connection belongs to.
    fn namespace(&self) -> &str;

    /// Send an event to the client.
    fn emit(&self, event: &str, args: &[Payload]) -> Result<(), TransportError>;

    /// Deliver a received packet to the application handlers.
    fn dispatch(&self, packet: EventPacket);

    /// Subscribe to the disconnect notification.
    fn on_disconnect(&self, listener: DisconnectListener);
}

/// Hook run by a namespace for every newly established connection.
///
/// The returned connection is the one the namespace uses from then on, so a
/// hook can decorate the connection it receives.
pub trait ConnectHook: Send + Sync {
    fn on_connect(&self, conn: Arc<dyn Connection>) -> Arc<dyn Connection>;
}

/// A logical partition of the messaging server.
pub trait Namespace: Send + Sync {
    fn name(&self) -> &str;

    /// Attach a hook for connections established from now on.
    fn add_connect_hook(&self, hook: Arc<dyn ConnectHook>);
}

/// The observed messaging server.
pub trait MessagingServer: Send + Sync {
    /// Identifiers of all namespaces that currently exist.
    fn namespace_names(&self) -> Vec<String>;

    fn namespace(&self, name: &str) -> Option<Arc<dyn Namespace>>;

    /// Live count of connected sessions, as accounted by the transport.
    fn clients_count(&self) -> usize;
}
