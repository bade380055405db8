//! GPUd - accelerator-host health-monitoring agent.
//!
//! Thin entry point only (§1: the binary's own flags/CLI surface is out of
//! scope): loads ambient configuration, wires a bare `gpud_core::Runtime`,
//! and serves it behind the HTTP façade until terminated.

#![forbid(unsafe_code)]

mod config;

use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gpud=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // rustls 0.23 requires an explicit crypto provider installed before any
    // TLS config is built.
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("rustls ring provider installed exactly once");

    let app_config = config::load()?;
    let server_config = gpud_server::ServerConfig::new(app_config.bind_addr()?)
        .with_tls(app_config.tls())
        .with_request_deadline(app_config.request_deadline());

    let runtime = gpud_core::Runtime::new();
    runtime.start().await;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gpud starting");

    let shutdown_runtime = runtime.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        shutdown_runtime.shutdown().await;
        std::process::exit(0);
    });

    gpud_server::serve(runtime, server_config).await?;
    Ok(())
}

/// Smoke check that the TLS provider installs without panicking more than
/// once when only one test in this binary exercises it (the real `main`
/// never runs under `cargo test`).
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_deadline_matches_scheduler_request_deadline() {
        let config = config::AppConfig::default();
        assert_eq!(config.request_deadline(), Duration::from_secs(30));
    }
}
