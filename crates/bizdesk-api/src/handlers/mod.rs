pub mod entities;
pub mod files;
pub mod statistics;

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

/// `limit` is clamped to 1..=100, `offset` to >= 0.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
