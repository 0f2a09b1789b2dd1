//! Job Finder Server
//!
//! Serves the job search page, runs on-demand searches and schedules the
//! daily email digest.

mod config;
mod routes;
mod scheduler;
mod views;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::routes::{AppState, build_app};
use crate::scheduler::{DigestScheduler, smtp_digest_task};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Job Finder server");

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded, job site: {}", config.fetcher.base_url);

    let scheduler = match config.smtp.clone() {
        Some(smtp) => {
            tracing::info!(
                "Email digests via {}:{} at {} daily",
                smtp.host,
                smtp.port,
                config.digest_time.format("%H:%M")
            );
            Some(DigestScheduler::new(
                config.digest_time,
                config.scheduler_poll,
                smtp_digest_task(config.fetcher.clone(), smtp),
            ))
        }
        None => {
            tracing::warn!("SMTP_USERNAME/SMTP_PASSWORD not set, email notifications disabled");
            None
        }
    };

    let state = Arc::new(AppState {
        fetcher_config: config.fetcher.clone(),
        scheduler,
    });
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    tracing::info!("Server running at http://{}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
