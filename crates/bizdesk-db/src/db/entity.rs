use async_trait::async_trait;
use bizdesk_core::models::Entity;
use bizdesk_core::AppError;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::transaction::TransactionGuard;
use crate::store_traits::EntityStore;

const ENTITY_COLUMNS: &str = "id, tenant_id, table_name, data, created_at, updated_at";

/// Generic JSON documents, one logical table per `table_name`
#[derive(Clone)]
pub struct EntityRepository {
    pool: PgPool,
}

impl EntityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lock the row, apply `set_data` (a `data = ...` expression over `$4`)
    /// and return the row as it was and as it is now.
    async fn update_returning_both(
        &self,
        operation: &'static str,
        tenant_id: Uuid,
        table: &str,
        id: Uuid,
        set_data: &str,
        value: &JsonValue,
    ) -> Result<Option<(Entity, Entity)>, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool, operation).await?;

        let before = sqlx::query_as::<Postgres, Entity>(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities \
             WHERE tenant_id = $1 AND table_name = $2 AND id = $3 FOR UPDATE"
        ))
        .bind(tenant_id)
        .bind(table)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        let Some(before) = before else {
            tx.rollback().await?;
            return Ok(None);
        };

        let after = sqlx::query_as::<Postgres, Entity>(&format!(
            "UPDATE entities SET {set_data}, updated_at = NOW() \
             WHERE tenant_id = $1 AND table_name = $2 AND id = $3 \
             RETURNING {ENTITY_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(table)
        .bind(id)
        .bind(value)
        .fetch_one(&mut **tx)
        .await?;

        tx.commit().await?;
        Ok(Some((before, after)))
    }
}

#[async_trait]
impl EntityStore for EntityRepository {
    #[tracing::instrument(skip(self, data), fields(db.table = "entities", db.operation = "insert"))]
    async fn create(
        &self,
        tenant_id: Uuid,
        table: &str,
        data: &JsonValue,
    ) -> Result<Entity, AppError> {
        let entity = sqlx::query_as::<Postgres, Entity>(&format!(
            "INSERT INTO entities (tenant_id, table_name, data) VALUES ($1, $2, $3) \
             RETURNING {ENTITY_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(table)
        .bind(data)
        .fetch_one(&self.pool)
        .await?;

        Ok(entity)
    }

    #[tracing::instrument(skip(self), fields(db.table = "entities", db.operation = "select", db.record_id = %id))]
    async fn get(
        &self,
        tenant_id: Uuid,
        table: &str,
        id: Uuid,
    ) -> Result<Option<Entity>, AppError> {
        let entity = sqlx::query_as::<Postgres, Entity>(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities \
             WHERE tenant_id = $1 AND table_name = $2 AND id = $3"
        ))
        .bind(tenant_id)
        .bind(table)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entity)
    }

    #[tracing::instrument(skip(self), fields(db.table = "entities", db.operation = "select"))]
    async fn list(
        &self,
        tenant_id: Uuid,
        table: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entity>, AppError> {
        let entities = sqlx::query_as::<Postgres, Entity>(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities \
             WHERE tenant_id = $1 AND table_name = $2 \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(tenant_id)
        .bind(table)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(entities)
    }

    #[tracing::instrument(skip(self, data), fields(db.table = "entities", db.operation = "update", db.record_id = %id))]
    async fn replace(
        &self,
        tenant_id: Uuid,
        table: &str,
        id: Uuid,
        data: &JsonValue,
    ) -> Result<Option<(Entity, Entity)>, AppError> {
        self.update_returning_both("entities.replace", tenant_id, table, id, "data = $4", data)
            .await
    }

    #[tracing::instrument(skip(self, patch), fields(db.table = "entities", db.operation = "update", db.record_id = %id))]
    async fn merge(
        &self,
        tenant_id: Uuid,
        table: &str,
        id: Uuid,
        patch: &JsonValue,
    ) -> Result<Option<(Entity, Entity)>, AppError> {
        // jsonb `||` replaces top-level keys and keeps the others.
        self.update_returning_both(
            "entities.merge",
            tenant_id,
            table,
            id,
            "data = data || $4",
            patch,
        )
        .await
    }

    #[tracing::instrument(skip(self), fields(db.table = "entities", db.operation = "delete", db.record_id = %id))]
    async fn delete(
        &self,
        tenant_id: Uuid,
        table: &str,
        id: Uuid,
    ) -> Result<Option<Entity>, AppError> {
        let entity = sqlx::query_as::<Postgres, Entity>(&format!(
            "DELETE FROM entities WHERE tenant_id = $1 AND table_name = $2 AND id = $3 \
             RETURNING {ENTITY_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(table)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entity)
    }

    #[tracing::instrument(skip(self), fields(db.table = "entities", db.operation = "select"))]
    async fn list_tenant_batch(
        &self,
        tenant_id: Uuid,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Entity>, AppError> {
        let entities = sqlx::query_as::<Postgres, Entity>(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities \
             WHERE tenant_id = $1 AND ($2::uuid IS NULL OR id > $2) \
             ORDER BY id LIMIT $3"
        ))
        .bind(tenant_id)
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entities)
    }
}
