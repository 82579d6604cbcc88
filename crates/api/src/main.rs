//! Order execution engine server
//!
//! Loads configuration, starts the worker pool and serves the HTTP and
//! WebSocket API until Ctrl-C or SIGTERM.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use order_engine::Engine;
use order_engine_api::{build_router, ApiState};
use order_engine_config::{AppConfig, ConfigLoader, ENV_PREFIX};
use order_engine_metrics::{init_tracing, MetricsCollector, MetricsServer};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML, YAML or JSON); environment overrides apply on top
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP port, overriding the configured one
    #[arg(long)]
    port: Option<u16>,
}

fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::from_file_with_env(path, ENV_PREFIX)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigLoader::from_env()?,
    };

    if let Some(port) = args.port {
        config.server.port = port;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_tracing(&config.server.log_level, config.server.log_json)?;

    info!("Starting order execution engine");
    info!("  Port: {}", config.server.port);
    info!("  Venues: {}", config.router.venues.join(", "));
    info!(
        "  Workers: {} (rate limit {} per {:?})",
        config.queue.concurrency,
        config.queue.rate_limit,
        config.queue.rate_window()
    );

    let engine = Arc::new(
        Engine::from_config(&config)
            .await
            .context("building engine")?,
    );
    engine.start().await?;

    if config.server.metrics_enabled {
        let addr = format!("{}:{}", config.server.host, config.server.metrics_port);
        let server = MetricsServer::new(Arc::new(MetricsCollector::new()), addr);
        tokio::spawn(async move {
            if let Err(e) = server.serve().await {
                error!(error = %e, "Metrics server stopped");
            }
        });
    }

    let app = build_router(ApiState::new(engine.clone()));
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Order engine listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining workers");
    match engine.shutdown(config.queue.shutdown_timeout()).await {
        Some(report) if report.abandoned > 0 => {
            warn!(
                abandoned = report.abandoned,
                "Shutdown timed out; abandoned jobs will be recovered on restart"
            );
        }
        Some(_) => info!("Worker pool drained"),
        None => {}
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
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
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
