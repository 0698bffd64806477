#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! QuantumEco ledger node entrypoint (systemd-friendly).
//! Opens the ledger, starts the write executor and the metrics endpoint,
//! and runs until SIGINT.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use quantumeco::core::{
    clock::SystemClock,
    config::{LogSettings, NodeConfig},
    ledger::Ledger,
    runtime::executor::{spawn_executor, ExecutorSettings},
};
use quantumeco::monitoring::metrics::Metrics;
use tracing::{error, info, warn};

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn init_tracing(log: &LogSettings) {
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(log.level());
    // A subscriber may already be installed by an embedding process.
    let _ = if log.json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> (StatusCode, String) {
    match metrics.render() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = PathBuf::from(env("QUANTUMECO_CONFIG", "./quantumeco.toml"));
    let mut cfg = NodeConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Ok(dir) = std::env::var("QUANTUMECO_DATA_DIR") {
        cfg.node.data_dir = dir;
    }
    init_tracing(&cfg.log);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_sha = option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        built = option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
        rustc = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown"),
        "quantumeco node starting"
    );

    let metrics = Arc::new(Metrics::new().context("metrics init")?);
    let ledger = Arc::new(Ledger::open(&cfg, SystemClock::shared()).context("opening ledger")?);
    info!(
        data_dir = %cfg.node.data_dir,
        owner = %cfg.ledger.owner(),
        state_root = %hex::encode(ledger.state_root()?),
        "ledger ready"
    );

    let (handle, executor) = spawn_executor(
        ledger.clone(),
        ExecutorSettings::from_config(&cfg.ledger),
        Some(metrics.clone()),
    );

    let mut events = ledger.subscribe();
    let ev_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ev) => tracing::debug!(?ev, "ledger event"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "event subscriber lagged")
                }
                Err(_) => break,
            }
        }
    });

    let server = if cfg.metrics.listen_addr.is_empty() {
        None
    } else {
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(metrics.clone());
        let listener = tokio::net::TcpListener::bind(&cfg.metrics.listen_addr)
            .await
            .with_context(|| format!("binding metrics on {}", cfg.metrics.listen_addr))?;
        info!(addr = %cfg.metrics.listen_addr, "metrics endpoint listening");
        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "metrics server failed");
            }
        }))
    };

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown requested");

    if let Some(server) = server {
        server.abort();
    }
    if let Err(e) = handle.shutdown().await {
        warn!(error = %e, "executor already stopped");
    }
    if let Err(e) = executor.await {
        warn!(error = %e, "executor task failed");
    }
    ev_task.abort();
    ledger.flush().context("final flush")?;
    info!(state_root = %hex::encode(ledger.state_root()?), "quantumeco node stopped");
    Ok(())
}
