use anyhow::{Context, Result};
use bizdesk_core::Config;
use bizdesk_storage::{create_storage, Storage};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing storage...");
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage")?;
    tracing::info!(backend = ?storage.backend_type(), "Storage initialized successfully");
    Ok(storage)
}
