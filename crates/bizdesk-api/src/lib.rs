//! Bizdesk HTTP API
//!
//! Axum handlers, authentication and application setup for the document
//! and file attachment service.

mod api_doc;
pub mod auth;
pub mod constants;
pub mod error;
mod handlers;
mod middleware;
pub mod setup;
pub mod state;
mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
