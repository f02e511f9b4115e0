use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Running document count and field sum maintained for one tenant table.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct EntityStatistic {
    pub tenant_id: Uuid,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "table_name"))]
    pub table: String,
    /// `None` for count-only statistics.
    pub field: Option<String>,
    pub count: i64,
    #[schema(value_type = f64)]
    pub sum: Decimal,
    pub updated_at: DateTime<Utc>,
}
