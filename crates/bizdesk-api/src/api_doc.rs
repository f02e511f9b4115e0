//! OpenAPI documentation served at `/api/openapi.json` and rendered under `/docs`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::models::UserRole;
use crate::error;
use crate::handlers;
use bizdesk_core::models;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "HS256 token with sub, tenant_id and role claims, or the master API key",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bizdesk API",
        version = "0.1.0",
        description = "Multi-tenant business documents with file attachments. Documents embed `files:<id>` tokens to reference uploaded files; references, thumbnails and per-table statistics are maintained automatically. All endpoints are versioned under /api/v1/."
    ),
    paths(
        // Files
        handlers::files::upload_file,
        handlers::files::list_files,
        handlers::files::get_file,
        handlers::files::download_file,
        handlers::files::get_thumbnail,
        handlers::files::delete_file,
        handlers::files::reconcile_files,
        // Entities
        handlers::entities::create_entity,
        handlers::entities::list_entities,
        handlers::entities::get_entity,
        handlers::entities::replace_entity,
        handlers::entities::merge_entity,
        handlers::entities::delete_entity,
        // Statistics
        handlers::statistics::list_statistics,
        handlers::statistics::recompute_statistics,
    ),
    components(
        schemas(
            models::Entity,
            models::EntityStatistic,
            models::FileStatus,
            handlers::files::FileResponse,
            handlers::files::ReconcileResponse,
            handlers::PaginationQuery,
            UserRole,
            error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "files", description = "Upload, download and lifecycle of attachments"),
        (name = "entities", description = "Generic JSON documents per tenant table"),
        (name = "statistics", description = "Per-table document counts and sums")
    )
)]
pub struct ApiDoc;
