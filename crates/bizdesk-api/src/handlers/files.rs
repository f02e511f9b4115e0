use crate::auth::models::TenantContext;
use crate::constants::API_PREFIX;
use crate::error::{ErrorResponse, HttpAppError};
use crate::handlers::PaginationQuery;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use bizdesk_core::file_token;
use bizdesk_core::models::{FileRecord, FileStatus};
use bizdesk_core::AppError;
use bizdesk_processing::sanitize_filename;
use bizdesk_services::{FileContent, ReconcileReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct FileResponse {
    pub id: Uuid,
    /// Embed this in a document to attach the file to it.
    pub token: String,
    pub original_filename: String,
    pub content_type: String,
    pub file_size: i64,
    pub checksum: String,
    pub content_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub status: FileStatus,
    pub entity_refs: Vec<String>,
    pub referenced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FileRecord> for FileResponse {
    fn from(file: FileRecord) -> Self {
        let base = format!("{}/files/{}", API_PREFIX, file.id);
        Self {
            id: file.id,
            token: file_token(file.id),
            status: file.status(),
            thumbnail_url: file
                .has_thumbnail()
                .then(|| format!("{}/thumbnail", base)),
            content_url: format!("{}/content", base),
            original_filename: file.original_filename,
            content_type: file.content_type,
            file_size: file.file_size,
            checksum: file.checksum,
            entity_refs: file.entity_refs,
            referenced_at: file.referenced_at,
            created_at: file.created_at,
            updated_at: file.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DeleteQuery {
    /// Delete even while documents still reference the file.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconcileResponse {
    pub entities_scanned: usize,
    pub files_checked: usize,
    pub files_updated: u64,
}

impl From<ReconcileReport> for ReconcileResponse {
    fn from(report: ReconcileReport) -> Self {
        Self {
            entities_scanned: report.entities_scanned,
            files_checked: report.files_checked,
            files_updated: report.files_updated,
        }
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::InvalidInput(format!("Failed to read multipart: {}", e.body_text()))
    }
}

/// The single `file` field: bytes, client filename and declared content type.
async fn read_file_field(
    mut multipart: Multipart,
) -> Result<(Vec<u8>, String, Option<String>), AppError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        if upload.is_some() {
            return Err(AppError::InvalidInput(
                "Multiple file fields are not allowed; send exactly one field named 'file'"
                    .to_string(),
            ));
        }

        let filename = field.file_name().unwrap_or("unknown").to_string();
        let content_type = field.content_type().map(String::from);
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((data.to_vec(), filename, content_type));
    }

    upload.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))
}

fn content_response(content: FileContent, disposition: &str) -> Result<Response, HttpAppError> {
    let disposition = format!(
        "{}; filename=\"{}\"",
        disposition,
        sanitize_filename(&content.filename)
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content.content_type.as_str())
        .header(header::CONTENT_LENGTH, content.data.len().to_string())
        .header(header::CONTENT_DISPOSITION, disposition.as_str())
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(Body::from(content.data))
        .map_err(|e| HttpAppError(AppError::Internal(format!("Failed to build response: {}", e))))
}

#[utoipa::path(
    post,
    path = "/api/v1/files",
    tag = "files",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = FileResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 415, description = "File type not accepted", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, multipart), fields(tenant_id = %tenant_ctx.tenant_id, operation = "upload_file"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    tenant_ctx: TenantContext,
    multipart: Multipart,
) -> Result<(StatusCode, Json<FileResponse>), HttpAppError> {
    let (data, filename, content_type) = read_file_field(multipart).await?;

    let file = state
        .files
        .upload(
            tenant_ctx.tenant_id,
            &filename,
            content_type.as_deref(),
            data,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(file.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/files",
    tag = "files",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Files of the tenant, newest first", body = [FileResponse])
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    tenant_ctx: TenantContext,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Vec<FileResponse>>, HttpAppError> {
    let files = state
        .files
        .list(tenant_ctx.tenant_id, query.limit, query.offset)
        .await?;
    Ok(Json(files.into_iter().map(FileResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/files/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    tenant_ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<FileResponse>, HttpAppError> {
    let file = state.files.get(tenant_ctx.tenant_id, id).await?;
    Ok(Json(file.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/files/{id}/content",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Original bytes"),
        (status = 404, description = "File not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    tenant_ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Response, HttpAppError> {
    let content = state.files.download(tenant_ctx.tenant_id, id).await?;
    content_response(content, "attachment")
}

#[utoipa::path(
    get,
    path = "/api/v1/files/{id}/thumbnail",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Preview image"),
        (status = 404, description = "File not found or has no thumbnail", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_thumbnail(
    State(state): State<Arc<AppState>>,
    tenant_ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Response, HttpAppError> {
    let content = state.files.thumbnail(tenant_ctx.tenant_id, id).await?;
    content_response(content, "inline")
}

#[utoipa::path(
    delete,
    path = "/api/v1/files/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID"), DeleteQuery),
    responses(
        (status = 204, description = "File deleted"),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 409, description = "File is still referenced", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state), fields(tenant_id = %tenant_ctx.tenant_id, file_id = %id, operation = "delete_file"))]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    tenant_ctx: TenantContext,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, HttpAppError> {
    state
        .files
        .delete(tenant_ctx.tenant_id, id, query.force)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/files/reconcile",
    tag = "files",
    responses(
        (status = 200, description = "Reference sets rebuilt", body = ReconcileResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state), fields(tenant_id = %tenant_ctx.tenant_id, operation = "reconcile_files"))]
pub async fn reconcile_files(
    State(state): State<Arc<AppState>>,
    tenant_ctx: TenantContext,
) -> Result<Json<ReconcileResponse>, HttpAppError> {
    tenant_ctx.require_admin()?;
    let report = state
        .files
        .reconcile_references(tenant_ctx.tenant_id)
        .await?;
    Ok(Json(report.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(thumbnail: bool, refs: Vec<String>) -> FileRecord {
        let now = Utc::now();
        FileRecord {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            original_filename: "devis.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            file_size: 1024,
            checksum: "ab".repeat(32),
            storage_key: "files/t/devis.pdf".to_string(),
            storage_url: "http://localhost/files/t/devis.pdf".to_string(),
            thumbnail_key: thumbnail.then(|| "thumbnails/t/x.jpg".to_string()),
            thumbnail_content_type: thumbnail.then(|| "image/jpeg".to_string()),
            entity_refs: refs,
            referenced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_file_response_urls_and_token() {
        let file = record(true, vec![]);
        let id = file.id;
        let response = FileResponse::from(file);

        assert_eq!(response.token, format!("files:{}", id));
        assert_eq!(response.content_url, format!("/api/v1/files/{}/content", id));
        assert_eq!(
            response.thumbnail_url.as_deref(),
            Some(format!("/api/v1/files/{}/thumbnail", id).as_str())
        );
        assert_eq!(response.status, FileStatus::Pending);
    }

    #[test]
    fn test_file_response_without_thumbnail() {
        let response = FileResponse::from(record(false, vec!["invoices/1".to_string()]));
        assert!(response.thumbnail_url.is_none());
        assert_eq!(response.status, FileStatus::Referenced);
    }

    #[test]
    fn test_content_response_headers() {
        let response = content_response(
            FileContent {
                data: b"%PDF-1.7".to_vec(),
                content_type: "application/pdf".to_string(),
                filename: "facture \"mars\".pdf".to_string(),
            },
            "attachment",
        )
        .unwrap();

        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(headers[header::CONTENT_LENGTH], "8");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"facture__mars_.pdf\""
        );
    }
}
