//! Resource route groups. All of them sit behind the auth middleware.

use crate::constants::API_PREFIX;
use crate::handlers;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn file_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/files", API_PREFIX),
            post(handlers::files::upload_file).get(handlers::files::list_files),
        )
        .route(
            &format!("{}/files/reconcile", API_PREFIX),
            post(handlers::files::reconcile_files),
        )
        .route(
            &format!("{}/files/{{id}}", API_PREFIX),
            get(handlers::files::get_file).delete(handlers::files::delete_file),
        )
        .route(
            &format!("{}/files/{{id}}/content", API_PREFIX),
            get(handlers::files::download_file),
        )
        .route(
            &format!("{}/files/{{id}}/thumbnail", API_PREFIX),
            get(handlers::files::get_thumbnail),
        )
}

pub fn entity_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/entities/{{table}}", API_PREFIX),
            post(handlers::entities::create_entity).get(handlers::entities::list_entities),
        )
        .route(
            &format!("{}/entities/{{table}}/{{id}}", API_PREFIX),
            get(handlers::entities::get_entity)
                .put(handlers::entities::replace_entity)
                .patch(handlers::entities::merge_entity)
                .delete(handlers::entities::delete_entity),
        )
}

pub fn statistics_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/statistics", API_PREFIX),
            get(handlers::statistics::list_statistics),
        )
        .route(
            &format!("{}/statistics/recompute", API_PREFIX),
            post(handlers::statistics::recompute_statistics),
        )
}
