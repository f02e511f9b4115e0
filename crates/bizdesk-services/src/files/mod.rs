//! File attachments: upload pipeline, downloads, deletion and reference
//! reconciliation.

mod release;
mod service;

pub(crate) use release::{release_file, release_unreferenced_file};
pub use service::{FileContent, FileService, ReconcileReport};

use bizdesk_core::AppError;
use bizdesk_processing::ValidationError;
use bizdesk_storage::StorageError;

pub(crate) fn storage_error(err: StorageError) -> AppError {
    match err {
        StorageError::NotFound(key) => AppError::NotFound(format!("Stored object {}", key)),
        StorageError::InvalidKey(key) => AppError::InvalidInput(format!("Invalid storage key: {}", key)),
        other => AppError::Storage(other.to_string()),
    }
}

pub(crate) fn validation_error(err: ValidationError) -> AppError {
    match err {
        ValidationError::FileTooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
        ValidationError::EmptyFile | ValidationError::InvalidFilename(_) => {
            AppError::InvalidInput(err.to_string())
        }
        ValidationError::Denied { .. } | ValidationError::NotAllowed { .. } => {
            AppError::UnsupportedMediaType(err.to_string())
        }
    }
}
