//! Bizdesk Core Library
//!
//! Domain models, error types, configuration and the file reference token
//! scanner shared by every bizdesk crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod file_refs;
pub mod models;
pub mod storage_types;

pub use config::{AppConfig, BaseConfig, Config, StatisticTarget};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use file_refs::{diff_file_ids, extract_file_ids, file_token};
pub use storage_types::StorageBackend;
