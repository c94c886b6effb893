//! Flux Cockpit - upstream health aggregation service
//!
//! Probes the Flux network daemon, explorer, stats service and AI provider,
//! and serves normalized per-group health reports.

mod aggregate;
mod cache;
mod classify;
mod config;
mod probe;
mod registry;
mod scheduler;
mod web;

use aggregate::Aggregator;
use cache::ReportCache;
use classify::Classifier;
use config::ServerConfig;
use probe::ProbeExecutor;
use registry::Registry;
use scheduler::Refresher;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("flux_cockpit=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting Flux Cockpit on port {}...", cfg.http_port);
    tracing::info!(
        "Probe timeout {:?}, cache TTL {:?}, max {} concurrent probes",
        cfg.probe_timeout,
        cfg.cache_ttl,
        cfg.max_concurrent_probes
    );
    if cfg.ai_api_key.is_none() {
        tracing::warn!("FLUX_COCKPIT_AI_API_KEY not set; AI services will report auth required");
    }

    // Build registry and probe pipeline
    let registry = Arc::new(Registry::from_config(&cfg));
    tracing::info!(
        "Registry loaded: {} targets in groups {:?}",
        registry.targets().count(),
        registry.group_keys().collect::<Vec<_>>()
    );

    let executor = ProbeExecutor::new(&cfg.user_agent, cfg.ai_api_key.clone())?;
    let aggregator = Aggregator::new(executor, Classifier::default(), cfg.max_concurrent_probes);
    let cache = Arc::new(ReportCache::new());

    // Start background refresher
    let refresher = Refresher::new(
        registry.clone(),
        aggregator.clone(),
        cache.clone(),
        cfg.probe_timeout,
        cfg.refresh_interval,
    );
    refresher.start().await;

    // Start web server
    let server = Server::new(cfg, registry, aggregator, cache);
    server.start().await?;

    refresher.stop().await;

    Ok(())
}
