use async_trait::async_trait;
use bizdesk_core::models::Tenant;
use bizdesk_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::store_traits::TenantStore;

const TENANT_COLUMNS: &str = "id, name, status, created_at, updated_at";

#[derive(Clone)]
pub struct TenantRepository {
    pool: PgPool,
}

impl TenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "tenants", db.operation = "insert"))]
    pub async fn create(&self, name: &str) -> Result<Tenant, AppError> {
        let tenant = sqlx::query_as::<Postgres, Tenant>(&format!(
            "INSERT INTO tenants (name) VALUES ($1) RETURNING {TENANT_COLUMNS}"
        ))
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(tenant_id = %tenant.id, name = %tenant.name, "Tenant created");
        Ok(tenant)
    }

    #[tracing::instrument(skip(self), fields(db.table = "tenants", db.operation = "select"))]
    pub async fn list(&self) -> Result<Vec<Tenant>, AppError> {
        let tenants = sqlx::query_as::<Postgres, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(tenants)
    }
}

#[async_trait]
impl TenantStore for TenantRepository {
    #[tracing::instrument(skip(self), fields(db.table = "tenants", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<Postgres, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }
}
