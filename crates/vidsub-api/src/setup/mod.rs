//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use vidsub_core::Config;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    vidsub_infra::init_telemetry().context("Failed to initialize telemetry")?;
    tracing::info!("Configuration loaded and validated successfully");

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config)?;
    let state = services::initialize_services(&config, pool, storage).await?;
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
