use async_trait::async_trait;
use bizdesk_core::models::{FileRecord, NewFile};
use bizdesk_core::AppError;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::transaction::with_transaction;
use crate::store_traits::FileStore;

const FILE_COLUMNS: &str = "id, tenant_id, original_filename, content_type, file_size, checksum, \
     storage_key, storage_url, thumbnail_key, thumbnail_content_type, entity_refs, \
     referenced_at, created_at, updated_at";

/// Uploaded files and the documents referencing them
#[derive(Clone)]
pub struct FileRepository {
    pool: PgPool,
}

impl FileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileStore for FileRepository {
    #[tracing::instrument(skip(self, file), fields(db.table = "files", db.operation = "insert", db.record_id = %file.id))]
    async fn create(&self, file: NewFile) -> Result<FileRecord, AppError> {
        let record = sqlx::query_as::<Postgres, FileRecord>(&format!(
            r#"
            INSERT INTO files (
                id, tenant_id, original_filename, content_type, file_size, checksum,
                storage_key, storage_url, thumbnail_key, thumbnail_content_type
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {FILE_COLUMNS}
            "#
        ))
        .bind(file.id)
        .bind(file.tenant_id)
        .bind(&file.original_filename)
        .bind(&file.content_type)
        .bind(file.file_size)
        .bind(&file.checksum)
        .bind(&file.storage_key)
        .bind(&file.storage_url)
        .bind(&file.thumbnail_key)
        .bind(&file.thumbnail_content_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select", db.record_id = %id))]
    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn list(
        &self,
        tenant_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FileRecord>, AppError> {
        let records = sqlx::query_as::<Postgres, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE tenant_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(tenant_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "update", db.record_id = %id))]
    async fn add_reference(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        entity_ref: &str,
    ) -> Result<Option<FileRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, FileRecord>(&format!(
            r#"
            UPDATE files
            SET entity_refs = CASE
                    WHEN $3 = ANY(entity_refs) THEN entity_refs
                    ELSE ARRAY(
                        SELECT r FROM unnest(array_append(entity_refs, $3)) AS r
                        ORDER BY r COLLATE "C"
                    )
                END,
                referenced_at = COALESCE(referenced_at, NOW()),
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {FILE_COLUMNS}
            "#
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(entity_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "update", db.record_id = %id))]
    async fn remove_reference(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        entity_ref: &str,
    ) -> Result<Option<FileRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, FileRecord>(&format!(
            "UPDATE files SET entity_refs = array_remove(entity_refs, $3), updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2 RETURNING {FILE_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(entity_ref)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self, updates), fields(db.table = "files", db.operation = "update", files = updates.len()))]
    async fn set_references(
        &self,
        tenant_id: Uuid,
        updates: &[(Uuid, Vec<String>)],
    ) -> Result<u64, AppError> {
        // Sets are compared in byte order, matching the stored arrays.
        let updates: Vec<(Uuid, Vec<String>)> = updates
            .iter()
            .map(|(id, refs)| {
                let mut refs = refs.clone();
                refs.sort();
                refs.dedup();
                (*id, refs)
            })
            .collect();
        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                let mut changed = 0;
                for (id, entity_refs) in &updates {
                    let result = sqlx::query(
                        r#"
                        UPDATE files
                        SET entity_refs = $3,
                            referenced_at = CASE
                                WHEN cardinality($3::text[]) > 0 THEN COALESCE(referenced_at, NOW())
                                ELSE referenced_at
                            END,
                            updated_at = NOW()
                        WHERE tenant_id = $1 AND id = $2
                          AND ARRAY(
                                SELECT r FROM unnest(entity_refs) AS r ORDER BY r COLLATE "C"
                              ) IS DISTINCT FROM $3::text[]
                        "#,
                    )
                    .bind(tenant_id)
                    .bind(id)
                    .bind(entity_refs)
                    .execute(&mut **tx)
                    .await?;
                    changed += result.rows_affected();
                }
                Ok(changed)
            })
        })
        .await
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM files WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "delete", db.record_id = %id))]
    async fn delete_unreferenced(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM files WHERE tenant_id = $1 AND id = $2 AND cardinality(entity_refs) = 0",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn list_orphans(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FileRecord>, AppError> {
        let records = sqlx::query_as::<Postgres, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files \
             WHERE referenced_at IS NULL AND cardinality(entity_refs) = 0 AND created_at < $1 \
             ORDER BY created_at LIMIT $2"
        ))
        .bind(older_than)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.operation = "select"))]
    async fn list_ids_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<Postgres, Uuid>(
            "SELECT id FROM files WHERE tenant_id = $1 ORDER BY id",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
