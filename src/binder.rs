//! Namespace discovery and binding.
//!
//! Namespace creation is not observable on the server, so the binder scans
//! the namespace list at startup and then periodically. Each namespace gets
//! exactly one [`InstrumentHook`]; the bound set's `insert` is the single
//! check-and-insert step that guards hook attachment.

use crate::instrument::InstrumentHook;
use crate::metrics::SocketMetrics;
use crate::socket::MessagingServer;
use crate::telemetry::spans;
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

/// Default period between namespace scans.
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_millis(2000);

/// Shortest accepted scan period; tokio intervals reject zero.
pub const MIN_DISCOVERY_INTERVAL: Duration = Duration::from_millis(1);

/// Attaches instrumentation to every namespace of a server, once.
pub struct NamespaceBinder {
    metrics: Arc<SocketMetrics>,
    bound: DashSet<String>,
}

impl NamespaceBinder {
    pub fn new(metrics: Arc<SocketMetrics>) -> Self {
        Self {
            metrics,
            bound: DashSet::new(),
        }
    }

    /// Bind every namespace the server currently has.
    ///
    /// Returns how many namespaces were newly bound.
    pub fn bind_all(&self, server: &Arc<dyn MessagingServer>) -> usize {
        server
            .namespace_names()
            .iter()
            .filter(|name| self.bind_one(server, name))
            .count()
    }

    /// Bind a single namespace. Returns `false` if it was already bound or
    /// no longer exists.
    pub fn bind_one(&self, server: &Arc<dyn MessagingServer>, name: &str) -> bool {
        if self.bound.contains(name) || !self.bound.insert(name.to_string()) {
            return false;
        }

        let Some(namespace) = server.namespace(name) else {
            // Vanished between listing and lookup; allow a later scan to retry
            self.bound.remove(name);
            debug!(namespace = %name, "Namespace disappeared before binding");
            return false;
        };

        let _span = spans::namespace(name).entered();
        let hook = InstrumentHook::new(Arc::clone(&self.metrics), Arc::downgrade(server));
        namespace.add_connect_hook(Arc::new(hook));
        info!("Namespace bound");
        true
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bound.contains(name)
    }

    /// Sorted snapshot of bound namespace identifiers.
    pub fn bound_namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bound.iter().map(|n| n.key().clone()).collect();
        names.sort();
        names
    }

    /// Bind now, then rescan every `interval` until stopped.
    ///
    /// The scan also ends on its own once the server has been dropped.
    /// Intervals below [`MIN_DISCOVERY_INTERVAL`] are raised to it.
    /// Must be called from within a tokio runtime.
    pub fn start_discovery(
        self: &Arc<Self>,
        server: &Arc<dyn MessagingServer>,
        interval: Duration,
    ) -> DiscoveryHandle {
        self.bind_all(server);

        let interval = if interval < MIN_DISCOVERY_INTERVAL {
            warn!(?interval, "Discovery interval too short, using minimum");
            MIN_DISCOVERY_INTERVAL
        } else {
            interval
        };

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let binder = Arc::clone(self);
        let server = Arc::downgrade(server);
        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);

        let task = tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => {
                            debug!("Discovery stopped");
                            break;
                        }
                        _ = ticker.tick() => {
                            let Some(server) = server.upgrade() else {
                                info!("Server dropped, stopping namespace discovery");
                                break;
                            };
                            let added = binder.bind_all(&server);
                            if added > 0 {
                                info!(added, "Discovered new namespaces");
                            }
                        }
                    }
                }
            }
            .instrument(spans::discovery(interval_ms)),
        );

        DiscoveryHandle { cancel, task }
    }
}

/// Handle to a running discovery task.
pub struct DiscoveryHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl DiscoveryHandle {
    /// Request the scan loop to stop.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop and wait for the task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Discovery task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Hub;
    use prometheus::Registry;

    fn binder() -> (Arc<NamespaceBinder>, Arc<SocketMetrics>) {
        let metrics = Arc::new(SocketMetrics::register(&Registry::new(), "b").unwrap());
        (Arc::new(NamespaceBinder::new(metrics.clone())), metrics)
    }

    #[test]
    fn bind_one_is_idempotent() {
        let (binder, metrics) = binder();
        let hub = Hub::new();
        let server: Arc<dyn MessagingServer> = hub.clone();

        assert!(binder.bind_one(&server, "/"));
        for _ in 0..5 {
            assert!(!binder.bind_one(&server, "/"));
        }
        assert_eq!(hub.of("/").hook_count(), 1);

        let socket = hub.of("/").connect();
        socket.emit("chat", &[crate::Payload::from("hi")]).unwrap();
        assert_eq!(metrics.events_sent_total.with_label_values(&["chat", "/"]).get(), 1);
        assert_eq!(metrics.connects_total.with_label_values(&["/"]).get(), 1);
    }

    #[test]
    fn bind_all_covers_every_namespace() {
        let (binder, _) = binder();
        let hub = Hub::new();
        hub.of("/chat");
        hub.of("/admin");
        let server: Arc<dyn MessagingServer> = hub.clone();

        assert_eq!(binder.bind_all(&server), 3);
        assert_eq!(binder.bind_all(&server), 0);
        assert_eq!(binder.bound_namespaces(), vec!["/", "/admin", "/chat"]);
    }

    #[test]
    fn missing_namespace_is_not_recorded() {
        let (binder, _) = binder();
        let server: Arc<dyn MessagingServer> = Hub::new();
        assert!(!binder.bind_one(&server, "/nope"));
        assert!(!binder.is_bound("/nope"));
    }

    #[test]
    fn concurrent_binds_attach_one_hook() {
        let (binder, _) = binder();
        let hub = Hub::new();
        hub.of("/chat");
        let server: Arc<dyn MessagingServer> = hub.clone();
        let barrier = std::sync::Barrier::new(8);

        let (wins, added): (Vec<bool>, Vec<usize>) = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        let won = binder.bind_one(&server, "/");
                        (won, binder.bind_all(&server))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).unzip()
        });

        assert_eq!(wins.iter().filter(|w| **w).count(), 1);
        // "/chat" is newly bound by exactly one bind_all
        assert_eq!(added.iter().sum::<usize>(), 1);
        assert_eq!(hub.of("/").hook_count(), 1);
        assert_eq!(hub.of("/chat").hook_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_raised_to_minimum() {
        let (binder, _) = binder();
        let hub = Hub::new();
        let server: Arc<dyn MessagingServer> = hub.clone();

        let handle = binder.start_discovery(&server, Duration::ZERO);
        hub.of("/late");
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(binder.is_bound("/late"));
        assert!(!handle.is_finished());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_binds_late_namespaces() {
        let (binder, metrics) = binder();
        let hub = Hub::new();
        let server: Arc<dyn MessagingServer> = hub.clone();

        let handle = binder.start_discovery(&server, Duration::from_millis(2000));
        assert!(binder.is_bound("/"));

        hub.of("/late");
        assert!(!binder.is_bound("/late"));

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(binder.is_bound("/late"));

        let socket = hub.of("/late").connect();
        socket.emit("ping", &[]).unwrap();
        assert_eq!(metrics.events_sent_total.with_label_values(&["ping", "/late"]).get(), 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_discovery_no_longer_binds() {
        let (binder, _) = binder();
        let hub = Hub::new();
        let server: Arc<dyn MessagingServer> = hub.clone();

        let handle = binder.start_discovery(&server, Duration::from_millis(100));
        handle.stop();
        tokio::task::yield_now().await;

        hub.of("/after");
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!binder.is_bound("/after"));
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn discovery_ends_when_server_dropped() {
        let (binder, _) = binder();
        let hub = Hub::new();
        let server: Arc<dyn MessagingServer> = hub.clone();

        let handle = binder.start_discovery(&server, Duration::from_millis(100));
        drop(server);
        drop(hub);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(handle.is_finished());
    }
}
