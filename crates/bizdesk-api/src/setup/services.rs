//! Repositories, services and the trigger registry.

use crate::state::AppState;
use anyhow::{Context, Result};
use bizdesk_core::Config;
use bizdesk_db::{EntityRepository, FileRepository, StatisticsRepository, TenantRepository};
use bizdesk_processing::{FileValidator, ThumbnailConfig, ThumbnailPipeline};
use bizdesk_services::{
    CleanupService, EntityService, FileReferenceTrigger, FileService, StatisticsService,
    StatisticsTrigger, TriggerRegistry,
};
use bizdesk_storage::Storage;
use sqlx::PgPool;
use std::sync::Arc;

pub async fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let entity_repository = Arc::new(EntityRepository::new(pool.clone()));
    let file_repository = Arc::new(FileRepository::new(pool.clone()));
    let statistics_repository = Arc::new(StatisticsRepository::new(pool.clone()));
    let tenant_repository = TenantRepository::new(pool.clone());

    let triggers = TriggerRegistry::new();
    triggers
        .register(Arc::new(FileReferenceTrigger::new(
            file_repository.clone(),
            storage.clone(),
        )))
        .await;
    triggers
        .register(Arc::new(StatisticsTrigger::new(
            config.statistics_targets().to_vec(),
            statistics_repository.clone(),
        )))
        .await;
    tracing::info!(triggers = ?triggers.names().await, "Entity triggers registered");

    let thumbnail_config = ThumbnailConfig::from_config(config);
    tracing::info!(
        enabled = thumbnail_config.enabled,
        max_size = thumbnail_config.max_size,
        timeout_secs = thumbnail_config.timeout.as_secs(),
        "Thumbnail pipeline configured"
    );
    let thumbnails = Arc::new(
        ThumbnailPipeline::new(thumbnail_config).context("Failed to build thumbnail pipeline")?,
    );

    let validator = FileValidator::new(
        config.max_file_size_bytes(),
        config.allowed_mime_types().to_vec(),
    );

    let files = FileService::new(
        file_repository.clone(),
        entity_repository.clone(),
        storage.clone(),
        validator,
        thumbnails,
    );
    let entities = EntityService::new(entity_repository.clone(), triggers);
    let statistics = StatisticsService::new(
        statistics_repository,
        entity_repository,
        config.statistics_targets().to_vec(),
    );
    let cleanup = Arc::new(CleanupService::new(
        file_repository,
        storage.clone(),
        config.orphan_file_grace_hours(),
        config.cleanup_interval_secs(),
    ));

    Ok(Arc::new(AppState {
        config: config.clone(),
        pool,
        storage,
        tenants: tenant_repository,
        entities,
        files,
        statistics,
        cleanup,
        is_production: config.is_production(),
    }))
}
