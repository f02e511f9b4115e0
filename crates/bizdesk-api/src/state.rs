//! Application state shared by every handler.

use bizdesk_core::Config;
use bizdesk_db::TenantRepository;
use bizdesk_services::{CleanupService, EntityService, FileService, StatisticsService};
use bizdesk_storage::Storage;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pool: PgPool,
    pub storage: Arc<dyn Storage>,
    pub tenants: TenantRepository,
    pub entities: EntityService,
    pub files: FileService,
    pub statistics: StatisticsService,
    /// Started by the binary; tests drive `run_once` directly.
    pub cleanup: Arc<CleanupService>,
    pub is_production: bool,
}
