use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state derived from a file's reference set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Uploaded but not referenced by any document yet.
    Pending,
    /// Referenced by at least one document.
    Referenced,
}

/// An uploaded attachment together with its preview and reference set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FileRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub original_filename: String,
    pub content_type: String,
    pub file_size: i64,
    pub checksum: String,
    pub storage_key: String,
    pub storage_url: String,
    pub thumbnail_key: Option<String>,
    pub thumbnail_content_type: Option<String>,
    /// `{table}/{id}` of every entity embedding this file's token.
    pub entity_refs: Vec<String>,
    /// First time any entity referenced the file.
    pub referenced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn ref_count(&self) -> usize {
        self.entity_refs.len()
    }

    pub fn status(&self) -> FileStatus {
        if self.entity_refs.is_empty() {
            FileStatus::Pending
        } else {
            FileStatus::Referenced
        }
    }

    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail_key.is_some()
    }
}

/// Values needed to insert a new file row.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub original_filename: String,
    pub content_type: String,
    pub file_size: i64,
    pub checksum: String,
    pub storage_key: String,
    pub storage_url: String,
    pub thumbnail_key: Option<String>,
    pub thumbnail_content_type: Option<String>,
}
