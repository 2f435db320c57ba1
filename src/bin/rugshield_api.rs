//! RugShield API Server
//!
//! Multi-chain contract risk scanner over HTTP
//!
//! Usage:
//!   cargo run --bin rugshield_api
//!
//! Environment:
//!   PORT / RUGSHIELD_PORT - Server port (default: 8080)
//!   RUGSHIELD_HOST        - Server host (default: 0.0.0.0)
//!   INTERNAL_ADMIN_TOKEN  - Enables /api/v1/admin/* routes
//!   RUST_LOG              - Log filter (default: info)

use rugshield::api::{create_router, spawn_cleanup_task, AppState};
use rugshield::core::{InMemoryRepository, ScanService};
use rugshield::models::{ServerConfig, ServiceConfig};
use rugshield::providers::AnalyzerRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = ServiceConfig::from_env();
    let server = ServerConfig::from_env();

    let analyzers = AnalyzerRegistry::from_config(&config.providers)?;
    let repository = Arc::new(InMemoryRepository::new());
    let service = Arc::new(ScanService::new(
        repository.clone(),
        Some(repository),
        analyzers,
        config.clone(),
    ));

    if server.admin_token.is_none() {
        warn!("INTERNAL_ADMIN_TOKEN not set, admin routes will answer 403");
    }
    if !config.providers.lookups_enabled {
        warn!("Provider lookups disabled, scans use placeholder sources");
    }

    let state = Arc::new(AppState::new(service, &server));
    spawn_cleanup_task(state.rate_limiter.clone());

    let app = create_router(state);
    let addr: SocketAddr = server.bind_addr().parse()?;

    info!(
        free = config.quotas.free,
        pro = config.quotas.pro,
        api = config.quotas.api,
        unit_price_usd = config.billing.unit_price_usd,
        rate_limit_per_minute = server.rate_limit_per_minute,
        "🛡️ RugShield API starting on http://{}",
        addr
    );
    info!("Endpoints:");
    info!("  POST /api/v1/analyze          - Scan a contract/program/package");
    info!("  GET  /api/v1/scans[/:id]      - Stored scans");
    info!("  GET  /api/v1/keys/me          - Quota status for your key");
    info!("  POST /api/v1/keys/rotate      - Rotate your key");
    info!("  *    /api/v1/admin/...        - Key admin and billing reports");
    info!("  GET  /health                  - Health check");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("👋 RugShield API shutdown complete");
    Ok(())
}
