//! Shared key generation for storage backends.

use uuid::Uuid;

use bizdesk_core::constants::DEFAULT_TENANT_ID;

fn tenant_prefix(tenant_id: Uuid) -> String {
    if tenant_id == DEFAULT_TENANT_ID {
        "files".to_string()
    } else {
        format!("files/{}", tenant_id)
    }
}

/// Key of an original upload.
pub fn file_key(tenant_id: Uuid, filename: &str) -> String {
    format!("{}/{}", tenant_prefix(tenant_id), filename)
}

/// Key of the preview generated for `file_id`.
pub fn thumbnail_key(tenant_id: Uuid, file_id: Uuid, extension: &str) -> String {
    format!(
        "{}/thumbnails/{}.{}",
        tenant_prefix(tenant_id),
        file_id,
        extension
    )
}

/// Rejects keys that could escape the storage root.
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty() && !key.contains("..") && !key.starts_with('/') && !key.contains('\\')
}
