//! Remote storage setup

use anyhow::Result;
use std::sync::Arc;
use vidsub_core::Config;
use vidsub_storage::{create_remote_storage, RemoteStorage, StorageBackend};

pub fn setup_storage(config: &Config) -> Result<Arc<dyn RemoteStorage>> {
    tracing::info!(backend = %config.storage_backend(), "Initializing remote storage...");
    let storage = create_remote_storage(config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize remote storage: {}", e))?;

    if storage.backend_type() == StorageBackend::Memory && config.is_production() {
        anyhow::bail!("The memory storage backend cannot be used in production");
    }

    tracing::info!(
        backend = %storage.backend_type(),
        "Remote storage initialized"
    );
    Ok(storage)
}
