use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

/// A JSON document stored in one of a tenant's logical tables.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Entity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "table_name"))]
    pub table: String,
    #[schema(value_type = Object)]
    pub data: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(&self.table, self.id)
    }
}

/// Identity of an entity as recorded in a file's reference set: `{table}/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    pub table: String,
    pub id: Uuid,
}

impl EntityRef {
    pub fn new(table: impl Into<String>, id: Uuid) -> Self {
        EntityRef {
            table: table.into(),
            id,
        }
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.table, self.id)
    }
}

impl FromStr for EntityRef {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (table, id) = s
            .split_once('/')
            .ok_or_else(|| AppError::InvalidInput(format!("Invalid entity reference: {}", s)))?;
        validate_table_name(table)?;
        Ok(EntityRef {
            table: table.to_string(),
            id: Uuid::parse_str(id)?,
        })
    }
}

const MAX_TABLE_NAME_LEN: usize = 63;

/// Logical table names are lowercase identifiers of at most 63 characters.
pub fn validate_table_name(table: &str) -> Result<(), AppError> {
    let mut chars = table.chars();
    let valid = table.len() <= MAX_TABLE_NAME_LEN
        && chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "Invalid table name '{}': use lowercase letters, digits and underscores, starting with a letter",
            table
        )))
    }
}

/// Documents must be JSON objects.
pub fn validate_entity_data(data: &JsonValue) -> Result<(), AppError> {
    if data.is_object() {
        Ok(())
    } else {
        Err(AppError::InvalidInput(
            "Entity data must be a JSON object".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_names() {
        assert!(validate_table_name("invoices").is_ok());
        assert!(validate_table_name("stock_moves_2024").is_ok());
        assert!(validate_table_name("Invoices").is_err());
        assert!(validate_table_name("1invoices").is_err());
        assert!(validate_table_name("invoices;drop").is_err());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn entity_data_must_be_object() {
        assert!(validate_entity_data(&json!({"total": 10})).is_ok());
        assert!(validate_entity_data(&json!([1, 2])).is_err());
        assert!(validate_entity_data(&json!("files:x")).is_err());
    }

    #[test]
    fn entity_ref_display_and_parse() {
        let id = Uuid::new_v4();
        let r = EntityRef::new("invoices", id);
        let text = r.to_string();
        assert_eq!(text, format!("invoices/{}", id));
        assert_eq!(text.parse::<EntityRef>().unwrap(), r);
        assert!("invoices".parse::<EntityRef>().is_err());
        assert!("Bad/1".parse::<EntityRef>().is_err());
    }
}
