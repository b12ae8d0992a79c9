//! `stratum run`: start the gateway.
//!
//! Loads and validates projects, connects the cache, binds every route
//! to its data source, then serves until Ctrl+C / SIGTERM. Database pools
//! and the cache connection are closed after the listener drains.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheGateway;
use crate::cli::RunArgs;
use crate::config;
use crate::error::StratumError;
use crate::logging;
use crate::pool::{PoolOptions, PoolRegistry};
use crate::server::{self, AppState};
use crate::source::Outbound;

pub async fn execute(args: RunArgs) -> Result<(), StratumError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let (config, source_label) = config::load_validated(args.config.as_deref()).await?;
    let (db_count, api_count) = config.count_by_kind();
    if config.projects.is_empty() {
        tracing::warn!(source = %source_label, "no projects configured, serving /health only");
    }

    let cache = CacheGateway::connect(args.redis_url.as_deref()).await;
    let registry = Arc::new(PoolRegistry::new(PoolOptions {
        max_connections: args.db_max_connections,
        acquire_timeout: Duration::from_millis(args.db_acquire_timeout),
    }));
    let outbound = Outbound::new(
        server::build_http_client(),
        Some(args.user_agent.as_str()),
        Duration::from_millis(args.upstream_timeout),
    );

    let state = Arc::new(AppState::new(&config, cache, registry, &outbound)?);
    let router = server::build_router(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", args.host, args.listen_port()).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        source = %source_label,
        database_projects = db_count,
        api_projects = api_count,
        cache = state.cache.kind(),
        "stratum started"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    state.shutdown().await;
    tracing::info!("stratum stopped");
    Ok(())
}
