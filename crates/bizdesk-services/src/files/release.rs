use bizdesk_core::models::FileRecord;
use bizdesk_core::AppError;
use bizdesk_db::FileStore;
use bizdesk_storage::Storage;

/// Remove a file's stored objects, then its row.
///
/// Storage failures are logged; the row is deleted regardless.
pub(crate) async fn release_file(
    files: &dyn FileStore,
    storage: &dyn Storage,
    record: &FileRecord,
) -> Result<bool, AppError> {
    delete_objects(storage, record).await;

    let deleted = files.delete(record.tenant_id, record.id).await?;
    log_released(record);
    Ok(deleted)
}

/// Release a file only while its reference set is still empty.
///
/// The row goes first so a reference added concurrently keeps both the row
/// and its objects.
pub(crate) async fn release_unreferenced_file(
    files: &dyn FileStore,
    storage: &dyn Storage,
    record: &FileRecord,
) -> Result<bool, AppError> {
    if !files.delete_unreferenced(record.tenant_id, record.id).await? {
        tracing::debug!(
            file_id = %record.id,
            tenant_id = %record.tenant_id,
            "File gained a reference, keeping it"
        );
        return Ok(false);
    }

    delete_objects(storage, record).await;
    log_released(record);
    Ok(true)
}

async fn delete_objects(storage: &dyn Storage, record: &FileRecord) {
    let keys = std::iter::once(record.storage_key.as_str()).chain(record.thumbnail_key.as_deref());
    for key in keys {
        if let Err(e) = storage.delete(key).await {
            tracing::error!(
                error = %e,
                file_id = %record.id,
                storage_key = %key,
                "Failed to delete file from storage"
            );
        }
    }
}

fn log_released(record: &FileRecord) {
    tracing::info!(
        file_id = %record.id,
        tenant_id = %record.tenant_id,
        storage_key = %record.storage_key,
        "File released"
    );
}
