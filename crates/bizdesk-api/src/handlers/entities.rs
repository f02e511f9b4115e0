use crate::auth::models::TenantContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::PaginationQuery;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use bizdesk_core::models::Entity;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/api/v1/entities/{table}",
    tag = "entities",
    params(("table" = String, Path, description = "Table name, e.g. invoices")),
    request_body(content = inline(Object), content_type = "application/json", description = "Document body (a JSON object)"),
    responses(
        (status = 201, description = "Document created", body = Entity),
        (status = 400, description = "Invalid table name or body", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_entity(
    State(state): State<Arc<AppState>>,
    tenant_ctx: TenantContext,
    Path(table): Path<String>,
    ValidatedJson(data): ValidatedJson<JsonValue>,
) -> Result<(StatusCode, Json<Entity>), HttpAppError> {
    let entity = state
        .entities
        .create(tenant_ctx.tenant_id, &table, data)
        .await?;
    Ok((StatusCode::CREATED, Json(entity)))
}

#[utoipa::path(
    get,
    path = "/api/v1/entities/{table}",
    tag = "entities",
    params(("table" = String, Path, description = "Table name"), PaginationQuery),
    responses(
        (status = 200, description = "Documents, newest first", body = [Entity])
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_entities(
    State(state): State<Arc<AppState>>,
    tenant_ctx: TenantContext,
    Path(table): Path<String>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Vec<Entity>>, HttpAppError> {
    let entities = state
        .entities
        .list(tenant_ctx.tenant_id, &table, query.limit, query.offset)
        .await?;
    Ok(Json(entities))
}

#[utoipa::path(
    get,
    path = "/api/v1/entities/{table}/{id}",
    tag = "entities",
    params(
        ("table" = String, Path, description = "Table name"),
        ("id" = Uuid, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Document", body = Entity),
        (status = 404, description = "Document not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_entity(
    State(state): State<Arc<AppState>>,
    tenant_ctx: TenantContext,
    Path((table, id)): Path<(String, Uuid)>,
) -> Result<Json<Entity>, HttpAppError> {
    let entity = state.entities.get(tenant_ctx.tenant_id, &table, id).await?;
    Ok(Json(entity))
}

#[utoipa::path(
    put,
    path = "/api/v1/entities/{table}/{id}",
    tag = "entities",
    params(
        ("table" = String, Path, description = "Table name"),
        ("id" = Uuid, Path, description = "Document ID")
    ),
    request_body(content = inline(Object), content_type = "application/json", description = "New document body"),
    responses(
        (status = 200, description = "Document replaced", body = Entity),
        (status = 404, description = "Document not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn replace_entity(
    State(state): State<Arc<AppState>>,
    tenant_ctx: TenantContext,
    Path((table, id)): Path<(String, Uuid)>,
    ValidatedJson(data): ValidatedJson<JsonValue>,
) -> Result<Json<Entity>, HttpAppError> {
    let entity = state
        .entities
        .replace(tenant_ctx.tenant_id, &table, id, data)
        .await?;
    Ok(Json(entity))
}

#[utoipa::path(
    patch,
    path = "/api/v1/entities/{table}/{id}",
    tag = "entities",
    params(
        ("table" = String, Path, description = "Table name"),
        ("id" = Uuid, Path, description = "Document ID")
    ),
    request_body(content = inline(Object), content_type = "application/json", description = "Top-level keys to overwrite"),
    responses(
        (status = 200, description = "Document merged", body = Entity),
        (status = 404, description = "Document not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn merge_entity(
    State(state): State<Arc<AppState>>,
    tenant_ctx: TenantContext,
    Path((table, id)): Path<(String, Uuid)>,
    ValidatedJson(patch): ValidatedJson<JsonValue>,
) -> Result<Json<Entity>, HttpAppError> {
    let entity = state
        .entities
        .merge(tenant_ctx.tenant_id, &table, id, patch)
        .await?;
    Ok(Json(entity))
}

#[utoipa::path(
    delete,
    path = "/api/v1/entities/{table}/{id}",
    tag = "entities",
    params(
        ("table" = String, Path, description = "Table name"),
        ("id" = Uuid, Path, description = "Document ID")
    ),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Document not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_entity(
    State(state): State<Arc<AppState>>,
    tenant_ctx: TenantContext,
    Path((table, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, HttpAppError> {
    state
        .entities
        .delete(tenant_ctx.tenant_id, &table, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
