//! The collector: wires options, registry, binder, discovery and the
//! optional HTTP endpoint together.

use crate::binder::{DiscoveryHandle, NamespaceBinder};
use crate::config::{MetricsOptions, validation};
use crate::error::{MetricsError, MetricsResult};
use crate::http::{self, MetricsServer};
use crate::metrics::{self, ExpositionFormat, SocketMetrics};
use crate::socket::MessagingServer;
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Start collecting metrics for `server`.
pub async fn collect(
    server: Arc<dyn MessagingServer>,
    options: MetricsOptions,
) -> MetricsResult<SocketIoMetrics> {
    SocketIoMetrics::start(server, options).await
}

/// Running instrumentation of one messaging server.
pub struct SocketIoMetrics {
    registry: Registry,
    metrics: Arc<SocketMetrics>,
    binder: Arc<NamespaceBinder>,
    discovery: Option<DiscoveryHandle>,
    http: Option<MetricsServer>,
    shutdown: CancellationToken,
}

impl SocketIoMetrics {
    /// Register metrics, start the exports, then bind every namespace.
    ///
    /// Options are validated first. Every fallible step runs before any
    /// namespace is bound, and a failure unregisters whatever was registered,
    /// so an `Err` leaves the server and the registry as they were.
    /// Duplicate metric names in the target registry are returned as
    /// [`MetricsError::AlreadyRegistered`].
    pub async fn start(
        server: Arc<dyn MessagingServer>,
        options: MetricsOptions,
    ) -> MetricsResult<Self> {
        validation::validate(&options).map_err(MetricsError::InvalidOptions)?;

        let registry = options
            .registry
            .clone()
            .unwrap_or_else(|| metrics::default_registry().clone());

        let metrics = Arc::new(SocketMetrics::register(&registry, &options.prefix)?);
        let shutdown = CancellationToken::new();
        let http = match Self::start_exports(&registry, &options, &shutdown).await {
            Ok(http) => http,
            Err(e) => {
                metrics.unregister(&registry);
                return Err(e);
            }
        };

        let binder = Arc::new(NamespaceBinder::new(Arc::clone(&metrics)));
        let discovery = if options.check_for_new_namespaces {
            Some(binder.start_discovery(&server, options.discovery_interval()))
        } else {
            binder.bind_all(&server);
            None
        };

        info!(
            prefix = %options.prefix,
            namespaces = binder.bound_namespaces().len(),
            discovery = options.check_for_new_namespaces,
            "Socket metrics collection started"
        );

        Ok(Self {
            registry,
            metrics,
            binder,
            discovery,
            http,
            shutdown,
        })
    }

    /// Process metrics and the HTTP endpoint. On failure, anything this
    /// registered is removed again.
    async fn start_exports(
        registry: &Registry,
        options: &MetricsOptions,
        shutdown: &CancellationToken,
    ) -> MetricsResult<Option<MetricsServer>> {
        if options.collect_default_metrics {
            metrics::register_process_metrics(registry, &options.prefix)?;
        }
        if !options.create_server {
            return Ok(None);
        }

        match http::serve(registry.clone(), options.port, &options.path, shutdown.child_token()).await {
            Ok(server) => Ok(Some(server)),
            Err(e) => {
                if options.collect_default_metrics {
                    metrics::unregister_process_metrics(registry, &options.prefix);
                }
                Err(e)
            }
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<SocketMetrics> {
        &self.metrics
    }

    pub fn binder(&self) -> &Arc<NamespaceBinder> {
        &self.binder
    }

    /// Address of the HTTP endpoint, if one was started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.http.as_ref().map(MetricsServer::local_addr)
    }

    /// Encode every family in the registry.
    pub fn render(&self, format: ExpositionFormat) -> MetricsResult<Vec<u8>> {
        metrics::render(&self.registry, format)
    }

    pub fn render_text(&self) -> String {
        metrics::render_text(&self.registry)
    }

    /// Stop discovery and the HTTP endpoint, waiting for both to exit.
    ///
    /// Registered metrics stay in the registry.
    pub async fn close(self) {
        self.shutdown.cancel();
        if let Some(discovery) = self.discovery {
            discovery.shutdown().await;
        }
        if let Some(http) = self.http {
            http.join().await;
        }
        info!("Socket metrics collection stopped");
    }
}
