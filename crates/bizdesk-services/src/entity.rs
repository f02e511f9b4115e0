use std::sync::Arc;

use bizdesk_core::constants::MAX_PAGE_SIZE;
use bizdesk_core::models::{validate_entity_data, validate_table_name, Entity};
use bizdesk_core::AppError;
use bizdesk_db::EntityStore;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::triggers::{EntityEvent, TriggerRegistry};

/// Clamp list paging to `1..=MAX_PAGE_SIZE` and a non-negative offset.
pub(crate) fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        offset.unwrap_or(0).max(0),
    )
}

/// CRUD over generic JSON documents, firing triggers after each mutation.
#[derive(Clone)]
pub struct EntityService {
    entities: Arc<dyn EntityStore>,
    triggers: TriggerRegistry,
}

impl EntityService {
    pub fn new(entities: Arc<dyn EntityStore>, triggers: TriggerRegistry) -> Self {
        Self { entities, triggers }
    }

    pub fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    async fn fire(&self, event: EntityEvent) {
        let report = self.triggers.dispatch(&event).await;
        if !report.is_clean() {
            tracing::warn!(
                tenant_id = %event.tenant_id,
                entity_ref = %event.entity_ref(),
                failed = ?report.failures.iter().map(|f| f.trigger.as_str()).collect::<Vec<_>>(),
                "Entity saved but some triggers failed"
            );
        }
    }

    fn not_found(table: &str, id: Uuid) -> AppError {
        AppError::NotFound(format!("{} {} not found", table, id))
    }

    #[tracing::instrument(skip(self, data))]
    pub async fn create(
        &self,
        tenant_id: Uuid,
        table: &str,
        data: JsonValue,
    ) -> Result<Entity, AppError> {
        validate_table_name(table)?;
        validate_entity_data(&data)?;

        let entity = self.entities.create(tenant_id, table, &data).await?;
        tracing::info!(entity_ref = %entity.entity_ref(), "Entity created");

        self.fire(EntityEvent::created(&entity)).await;
        Ok(entity)
    }

    pub async fn get(&self, tenant_id: Uuid, table: &str, id: Uuid) -> Result<Entity, AppError> {
        validate_table_name(table)?;
        self.entities
            .get(tenant_id, table, id)
            .await?
            .ok_or_else(|| Self::not_found(table, id))
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        table: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Entity>, AppError> {
        validate_table_name(table)?;
        let (limit, offset) = page(limit, offset);
        self.entities.list(tenant_id, table, limit, offset).await
    }

    #[tracing::instrument(skip(self, data))]
    pub async fn replace(
        &self,
        tenant_id: Uuid,
        table: &str,
        id: Uuid,
        data: JsonValue,
    ) -> Result<Entity, AppError> {
        validate_table_name(table)?;
        validate_entity_data(&data)?;

        let (before, after) = self
            .entities
            .replace(tenant_id, table, id, &data)
            .await?
            .ok_or_else(|| Self::not_found(table, id))?;

        self.fire(EntityEvent::updated(&before, &after)).await;
        Ok(after)
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn merge(
        &self,
        tenant_id: Uuid,
        table: &str,
        id: Uuid,
        patch: JsonValue,
    ) -> Result<Entity, AppError> {
        validate_table_name(table)?;
        validate_entity_data(&patch)?;

        let (before, after) = self
            .entities
            .merge(tenant_id, table, id, &patch)
            .await?
            .ok_or_else(|| Self::not_found(table, id))?;

        self.fire(EntityEvent::updated(&before, &after)).await;
        Ok(after)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, tenant_id: Uuid, table: &str, id: Uuid) -> Result<Entity, AppError> {
        validate_table_name(table)?;

        let deleted = self
            .entities
            .delete(tenant_id, table, id)
            .await?
            .ok_or_else(|| Self::not_found(table, id))?;
        tracing::info!(entity_ref = %deleted.entity_ref(), "Entity deleted");

        self.fire(EntityEvent::deleted(&deleted)).await;
        Ok(deleted)
    }
}
