// SPDX-License-Identifier: BUSL-1.1
//! `stp-thumbnail` server binary.
//!
//! Reads [`AppConfig`] from the environment, wires the external converter
//! into the orchestrator, and serves until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use stp_api::config::AppConfig;
use stp_api::state::AppState;
use stp_engine::CommandEngine;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    std::fs::create_dir_all(&config.cache_dir).with_context(|| {
        format!("failed to create cache directory {}", config.cache_dir.display())
    })?;

    let engine = CommandEngine::new(&config.engine_program, config.engine_timeout);
    let addr = config.listen_addr();
    tracing::info!(
        cache_dir = %config.cache_dir.display(),
        engine = %config.engine_program.display(),
        timeout_secs = config.engine_timeout.as_secs(),
        metrics = config.metrics_enabled,
        "stp-thumbnail starting"
    );

    let app = stp_api::app(AppState::new(config, Arc::new(engine)));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("stp-thumbnail listening on {addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("stp-thumbnail stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
