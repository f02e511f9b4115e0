//! Bizdesk Storage Library
//!
//! Object storage for uploaded attachments and their previews, behind the
//! [`Storage`] trait with S3 and local filesystem backends.
//!
//! # Storage key format
//!
//! Keys are tenant-scoped and identical across backends:
//!
//! - **Default tenant**: `files/{filename}`, thumbnails under `files/thumbnails/`
//! - **Other tenants**: `files/{tenant_id}/{filename}`, thumbnails under `files/{tenant_id}/thumbnails/`
//!
//! Keys never contain `..` or a leading `/`.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

pub use bizdesk_core::StorageBackend;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
