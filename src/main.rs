use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use modelchain::{
    api::build_app,
    config::{sanitize_for_logging, EngineConfig},
    Engine,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first - this validates routing weights and ledger settings
    let config = EngineConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check MODELCHAIN_* environment variables.");
        e
    })?;

    init_logging(&config)?;

    info!("Starting ModelChain trust routing engine");
    info!(
        "Routing weights: trust={}, cost={}, latency={}, tier={}",
        config.routing.trust_weight,
        config.routing.cost_weight,
        config.routing.latency_weight,
        config.routing.tier_width
    );

    let engine = Arc::new(Engine::from_config(&config).context("Failed to initialize engine")?);
    if config.ledger.is_external() {
        info!(
            "Committing batches to {} (key {})",
            config.ledger.url,
            sanitize_for_logging(&config.ledger.api_key)
        );
    } else {
        warn!("Using in-memory ledger - committed batches will not survive a restart");
    }

    let app = build_app(engine, &config);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("Engine listening on {}", bind_addr);
    info!(
        "Middleware: Rate limit={}/min, Max body={}KB, CORS={}",
        config.security.rate_limit_per_minute,
        config.security.max_request_size / 1024,
        config.server.enable_cors
    );

    // Serve with connect info for client IP extraction
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Initialize logging; `RUST_LOG` overrides the configured level
fn init_logging(config: &EngineConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logging.level.to_lowercase()))
        .context("Invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    if config.logging.sanitize_logs {
        info!("Logging initialized with address masking enabled");
    }

    Ok(())
}
