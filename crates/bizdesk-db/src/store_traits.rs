//! Storage seams used by the services.
//!
//! The Postgres repositories implement these; service tests swap in
//! in-memory versions.

use async_trait::async_trait;
use bizdesk_core::models::{Entity, EntityStatistic, FileRecord, NewFile, Tenant};
use bizdesk_core::AppError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Tenant>, AppError>;
}

/// Entity mutations return enough state for the triggers to diff.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn create(
        &self,
        tenant_id: Uuid,
        table: &str,
        data: &JsonValue,
    ) -> Result<Entity, AppError>;

    async fn get(&self, tenant_id: Uuid, table: &str, id: Uuid)
        -> Result<Option<Entity>, AppError>;

    /// Newest first.
    async fn list(
        &self,
        tenant_id: Uuid,
        table: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entity>, AppError>;

    /// Returns `(before, after)`, `None` when the entity does not exist.
    async fn replace(
        &self,
        tenant_id: Uuid,
        table: &str,
        id: Uuid,
        data: &JsonValue,
    ) -> Result<Option<(Entity, Entity)>, AppError>;

    /// Shallow merge of the top-level keys of `patch` into the stored object.
    async fn merge(
        &self,
        tenant_id: Uuid,
        table: &str,
        id: Uuid,
        patch: &JsonValue,
    ) -> Result<Option<(Entity, Entity)>, AppError>;

    async fn delete(&self, tenant_id: Uuid, table: &str, id: Uuid)
        -> Result<Option<Entity>, AppError>;

    /// Keyset page over every table of a tenant, ordered by id.
    async fn list_tenant_batch(
        &self,
        tenant_id: Uuid,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Entity>, AppError>;
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn create(&self, file: NewFile) -> Result<FileRecord, AppError>;

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<FileRecord>, AppError>;

    async fn list(
        &self,
        tenant_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FileRecord>, AppError>;

    /// Idempotent; stamps `referenced_at` the first time.
    async fn add_reference(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        entity_ref: &str,
    ) -> Result<Option<FileRecord>, AppError>;

    async fn remove_reference(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        entity_ref: &str,
    ) -> Result<Option<FileRecord>, AppError>;

    /// Overwrite the reference sets of several files at once, returning how
    /// many rows changed. Ids of other tenants are skipped.
    async fn set_references(
        &self,
        tenant_id: Uuid,
        updates: &[(Uuid, Vec<String>)],
    ) -> Result<u64, AppError>;

    /// `true` when a row was removed.
    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError>;

    /// Like [`FileStore::delete`], but keeps a row whose reference set is not empty.
    async fn delete_unreferenced(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError>;

    /// Files of any tenant never referenced and created before `older_than`.
    async fn list_orphans(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FileRecord>, AppError>;

    async fn list_ids_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Uuid>, AppError>;
}

#[async_trait]
pub trait StatisticsStore: Send + Sync {
    /// Add the deltas to the `(table, field)` row, creating it at zero first.
    async fn apply(
        &self,
        tenant_id: Uuid,
        table: &str,
        field: Option<&str>,
        count_delta: i64,
        sum_delta: Decimal,
    ) -> Result<(), AppError>;

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<EntityStatistic>, AppError>;

    async fn replace(
        &self,
        tenant_id: Uuid,
        table: &str,
        field: Option<&str>,
        count: i64,
        sum: Decimal,
    ) -> Result<(), AppError>;
}
