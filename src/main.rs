//! health-engine daemon.
//!
//! Loads a TOML config, runs the configured health checks and serves their
//! aggregate readiness/liveness over HTTP until SIGINT/SIGTERM.
//!
//! ```text
//!   probes ──▶ scheduler tasks ──▶ snapshots ──▶ aggregator ──▶ responder ──▶ GET /health-check
//!                  (one per check)                              (axum, 200/503)
//! ```
//!
//! Shutdown order: readiness turns unhealthy, `shutdown_wait_period` elapses,
//! check tasks stop (bounded by `shutdown_grace`), then the listener closes.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use health_engine::config::{load_config, AppConfig};
use health_engine::http::HealthServer;
use health_engine::lifecycle::{build_engine, wait_for_signal, Shutdown};
use health_engine::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "health-engine")]
#[command(about = "Health check scheduler and readiness/liveness responder", long_about = None)]
struct Args {
    /// Path to the TOML config file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "health-engine starting"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let engine = build_engine(&config)?;
    let shutdown = Shutdown::new();
    let server = HealthServer::new(&config, Arc::new(engine.aggregator()));
    let mut server_task = tokio::spawn(server.run(shutdown.subscribe()));

    tokio::select! {
        signal = wait_for_signal() => {
            let signal = signal?;
            tracing::info!(signal, "Shutdown signal received");
        }
        result = &mut server_task => {
            tracing::error!("Health server exited unexpectedly");
            engine.shutdown().await;
            result??;
            return Ok(());
        }
    }

    engine.begin_shutdown();
    let wait = config.health.shutdown_wait_period;
    if !wait.is_zero() {
        tracing::info!(wait = ?wait, "Draining before stopping health checks");
        tokio::time::sleep(wait).await;
    }

    engine.shutdown().await;
    shutdown.trigger();
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
