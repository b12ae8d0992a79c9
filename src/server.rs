//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the route table,
//! cache gateway, pool registry, stats and uptime), [`build_router`] for
//! constructing the Axum router with its trace layer,
//! [`build_http_client`] for the connection-pooled hyper client, and
//! [`shutdown_signal`] for SIGTERM / Ctrl+C handling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::Router;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::cache::CacheGateway;
use crate::config::model::Config;
use crate::error::StratumError;
use crate::gateway::routing::RouteTable;
use crate::gateway::{self, BoundRoute};
use crate::health::health_handler;
use crate::pool::PoolRegistry;
use crate::source::Outbound;

#[derive(Debug)]
pub struct Stats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub bypasses: AtomicU64,
    pub not_found: AtomicU64,
    pub failed: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            bypasses: AtomicU64::new(0),
            not_found: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn log_summary(&self, uptime: Duration) {
        tracing::info!(
            uptime_seconds = uptime.as_secs(),
            hits = self.hits.load(Ordering::Relaxed),
            misses = self.misses.load(Ordering::Relaxed),
            bypasses = self.bypasses.load(Ordering::Relaxed),
            not_found = self.not_found.load(Ordering::Relaxed),
            failed = self.failed.load(Ordering::Relaxed),
            "request totals"
        );
    }
}

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
pub type HttpClient = Client<HttpsConnector, http_body_util::Full<bytes::Bytes>>;

pub struct AppState {
    pub routes: RouteTable<BoundRoute>,
    pub cache: CacheGateway,
    pub registry: Arc<PoolRegistry>,
    pub start_time: Instant,
    pub stats: Stats,
}

impl AppState {
    /// Bind every configured project. Malformed routes, unsupported
    /// dialects and invalid headers fail here.
    pub fn new(
        config: &Config,
        cache: CacheGateway,
        registry: Arc<PoolRegistry>,
        outbound: &Outbound,
    ) -> Result<Self, StratumError> {
        let routes = gateway::build_routes(config, &registry, outbound)?;
        Ok(Self {
            routes,
            cache,
            registry,
            start_time: Instant::now(),
            stats: Stats::new(),
        })
    }

    /// Release pools and the cache connection. Called once after the
    /// server stops accepting requests.
    pub async fn shutdown(&self) {
        self.registry.close_all().await;
        self.cache.close().await;
        self.stats.log_summary(self.start_time.elapsed());
    }
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // When multiple rustls crypto providers are compiled in, rustls cannot
    // auto-detect which one to use. Explicitly install `ring`.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .fallback(gateway::dispatch_handler)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
