use crate::auth::models::TenantContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{extract::State, Json};
use bizdesk_core::models::EntityStatistic;
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/v1/statistics",
    tag = "statistics",
    responses(
        (status = 200, description = "Running counts and sums of the tenant", body = [EntityStatistic])
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_statistics(
    State(state): State<Arc<AppState>>,
    tenant_ctx: TenantContext,
) -> Result<Json<Vec<EntityStatistic>>, HttpAppError> {
    let stats = state.statistics.list(tenant_ctx.tenant_id).await?;
    Ok(Json(stats))
}

#[utoipa::path(
    post,
    path = "/api/v1/statistics/recompute",
    tag = "statistics",
    responses(
        (status = 200, description = "Statistics rebuilt from the stored documents", body = [EntityStatistic]),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state), fields(tenant_id = %tenant_ctx.tenant_id, operation = "recompute_statistics"))]
pub async fn recompute_statistics(
    State(state): State<Arc<AppState>>,
    tenant_ctx: TenantContext,
) -> Result<Json<Vec<EntityStatistic>>, HttpAppError> {
    tenant_ctx.require_admin()?;
    let stats = state.statistics.recompute(tenant_ctx.tenant_id).await?;
    Ok(Json(stats))
}
