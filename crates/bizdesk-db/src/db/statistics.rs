use async_trait::async_trait;
use bizdesk_core::models::EntityStatistic;
use bizdesk_core::AppError;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::store_traits::StatisticsStore;

/// Running count and sum per `(tenant, table, field)`
///
/// Count-only targets are stored under the empty field name.
#[derive(Clone)]
pub struct StatisticsRepository {
    pool: PgPool,
}

impl StatisticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn field_key(field: Option<&str>) -> &str {
    field.unwrap_or("")
}

#[async_trait]
impl StatisticsStore for StatisticsRepository {
    #[tracing::instrument(skip(self), fields(db.table = "entity_statistics", db.operation = "upsert"))]
    async fn apply(
        &self,
        tenant_id: Uuid,
        table: &str,
        field: Option<&str>,
        count_delta: i64,
        sum_delta: Decimal,
    ) -> Result<(), AppError> {
        // The running sum must stay decodable as a `Decimal`.
        let result = sqlx::query(
            r#"
            INSERT INTO entity_statistics (tenant_id, table_name, field, count, sum, updated_at)
            VALUES ($1, $2, $3, GREATEST($4, 0), $5, NOW())
            ON CONFLICT (tenant_id, table_name, field) DO UPDATE
            SET count = GREATEST(entity_statistics.count + $4, 0),
                sum = entity_statistics.sum + EXCLUDED.sum,
                updated_at = NOW()
            WHERE ABS(entity_statistics.sum + EXCLUDED.sum) <= $6
            "#,
        )
        .bind(tenant_id)
        .bind(table)
        .bind(field_key(field))
        .bind(count_delta)
        .bind(sum_delta)
        .bind(Decimal::MAX)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidInput(format!(
                "Sum of {}.{} would overflow",
                table,
                field.unwrap_or("count")
            )));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "entity_statistics", db.operation = "select"))]
    async fn list(&self, tenant_id: Uuid) -> Result<Vec<EntityStatistic>, AppError> {
        let stats = sqlx::query_as::<Postgres, EntityStatistic>(
            r#"
            SELECT tenant_id, table_name, NULLIF(field, '') AS field, count, sum, updated_at
            FROM entity_statistics
            WHERE tenant_id = $1
            ORDER BY table_name, field
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(stats)
    }

    #[tracing::instrument(skip(self), fields(db.table = "entity_statistics", db.operation = "upsert"))]
    async fn replace(
        &self,
        tenant_id: Uuid,
        table: &str,
        field: Option<&str>,
        count: i64,
        sum: Decimal,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO entity_statistics (tenant_id, table_name, field, count, sum, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (tenant_id, table_name, field) DO UPDATE
            SET count = EXCLUDED.count, sum = EXCLUDED.sum, updated_at = NOW()
            "#,
        )
        .bind(tenant_id)
        .bind(table)
        .bind(field_key(field))
        .bind(count)
        .bind(sum)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_only_targets_use_empty_field() {
        assert_eq!(field_key(None), "");
        assert_eq!(field_key(Some("total")), "total");
    }
}
