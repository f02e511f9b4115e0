use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use bizdesk_core::models::{FileRecord, NewFile};
use bizdesk_core::{extract_file_ids, AppError};
use bizdesk_db::{EntityStore, FileStore};
use bizdesk_processing::{
    sanitize_filename, sniff, DetectedType, FileValidator, Thumbnail, ThumbnailPipeline,
};
use bizdesk_storage::keys::thumbnail_key;
use bizdesk_storage::Storage;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{release_file, storage_error, validation_error};
use crate::entity::page;

const RECONCILE_BATCH: i64 = 500;

/// Bytes of a stored object with what a client needs to serve it.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub data: Vec<u8>,
    pub content_type: String,
    pub filename: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub entities_scanned: usize,
    pub files_checked: usize,
    pub files_updated: u64,
}

/// Upload pipeline and lifecycle of attached files
#[derive(Clone)]
pub struct FileService {
    files: Arc<dyn FileStore>,
    entities: Arc<dyn EntityStore>,
    storage: Arc<dyn Storage>,
    validator: FileValidator,
    thumbnails: Arc<ThumbnailPipeline>,
}

impl FileService {
    pub fn new(
        files: Arc<dyn FileStore>,
        entities: Arc<dyn EntityStore>,
        storage: Arc<dyn Storage>,
        validator: FileValidator,
        thumbnails: Arc<ThumbnailPipeline>,
    ) -> Self {
        Self {
            files,
            entities,
            storage,
            validator,
            thumbnails,
        }
    }

    pub fn max_file_size(&self) -> usize {
        self.validator.max_file_size()
    }

    /// Best effort removal of objects written by an upload that did not finish.
    async fn discard(&self, keys: &[&str]) {
        for key in keys {
            if let Err(e) = self.storage.delete(key).await {
                tracing::error!(error = %e, storage_key = %key, "Failed to remove object of aborted upload");
            }
        }
    }

    /// Render a preview; converter failures only lose the preview.
    async fn render_thumbnail(
        &self,
        file_id: Uuid,
        detected: &DetectedType,
        data: &[u8],
    ) -> Option<Thumbnail> {
        match self.thumbnails.generate(detected, data).await {
            Ok(thumbnail) => thumbnail,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    file_id = %file_id,
                    content_type = detected.mime,
                    "Thumbnail generation failed, storing file without preview"
                );
                None
            }
        }
    }

    #[tracing::instrument(skip(self, data), fields(file.size = data.len()))]
    pub async fn upload(
        &self,
        tenant_id: Uuid,
        filename: &str,
        declared_content_type: Option<&str>,
        data: Vec<u8>,
    ) -> Result<FileRecord, AppError> {
        let start = Instant::now();

        self.validator
            .validate_file_size(data.len())
            .map_err(validation_error)?;
        self.validator
            .validate_filename(filename)
            .map_err(validation_error)?;

        let detected = sniff(&data, filename);
        self.validator
            .validate_type(&detected, filename)
            .map_err(validation_error)?;

        if let Some(declared) = declared_content_type {
            if !declared.eq_ignore_ascii_case(detected.mime) {
                tracing::debug!(
                    declared = %declared,
                    detected = detected.mime,
                    "Declared content type differs from sniffed type, using sniffed"
                );
            }
        }

        let id = Uuid::new_v4();
        let checksum = hex::encode(Sha256::digest(&data));
        let stored_name = format!("{}-{}", id, sanitize_filename(filename));

        let (storage_key, storage_url) = self
            .storage
            .upload(tenant_id, &stored_name, detected.mime, data.clone())
            .await
            .map_err(storage_error)?;

        let mut stored = vec![storage_key.clone()];
        let mut thumbnail_meta = None;

        if let Some(thumbnail) = self.render_thumbnail(id, &detected, &data).await {
            let key = thumbnail_key(tenant_id, id, thumbnail.extension);
            if let Err(e) = self
                .storage
                .upload_with_key(&key, thumbnail.data, thumbnail.content_type)
                .await
            {
                self.discard(&[&storage_key]).await;
                return Err(storage_error(e));
            }
            stored.push(key.clone());
            thumbnail_meta = Some((key, thumbnail.content_type.to_string()));
        }

        let (thumbnail_key, thumbnail_content_type) = thumbnail_meta.unzip();
        let new_file = NewFile {
            id,
            tenant_id,
            original_filename: filename.to_string(),
            content_type: detected.mime.to_string(),
            file_size: data.len() as i64,
            checksum,
            storage_key,
            storage_url,
            thumbnail_key,
            thumbnail_content_type,
        };

        let record = match self.files.create(new_file).await {
            Ok(record) => record,
            Err(e) => {
                let keys: Vec<&str> = stored.iter().map(String::as_str).collect();
                self.discard(&keys).await;
                return Err(e);
            }
        };

        tracing::info!(
            file_id = %record.id,
            tenant_id = %tenant_id,
            content_type = %record.content_type,
            size_bytes = record.file_size,
            thumbnail = record.has_thumbnail(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "File uploaded"
        );

        Ok(record)
    }

    pub async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<FileRecord, AppError> {
        self.files
            .get(tenant_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<FileRecord>, AppError> {
        let (limit, offset) = page(limit, offset);
        self.files.list(tenant_id, limit, offset).await
    }

    pub async fn download(&self, tenant_id: Uuid, id: Uuid) -> Result<FileContent, AppError> {
        let record = self.get(tenant_id, id).await?;
        let data = self
            .storage
            .download(&record.storage_key)
            .await
            .map_err(storage_error)?;

        Ok(FileContent {
            data,
            content_type: record.content_type,
            filename: record.original_filename,
        })
    }

    pub async fn thumbnail(&self, tenant_id: Uuid, id: Uuid) -> Result<FileContent, AppError> {
        let record = self.get(tenant_id, id).await?;
        let (Some(key), Some(content_type)) = (record.thumbnail_key, record.thumbnail_content_type)
        else {
            return Err(AppError::NotFound(format!("File {} has no thumbnail", id)));
        };

        let data = self.storage.download(&key).await.map_err(storage_error)?;
        let filename = key.rsplit('/').next().unwrap_or(&key).to_string();

        Ok(FileContent {
            data,
            content_type,
            filename,
        })
    }

    /// Delete a file. Referenced files need `force`.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, tenant_id: Uuid, id: Uuid, force: bool) -> Result<(), AppError> {
        let record = self.get(tenant_id, id).await?;

        if record.ref_count() > 0 && !force {
            return Err(AppError::Conflict(format!(
                "File {} is referenced by {} document(s): {}",
                id,
                record.ref_count(),
                record.entity_refs.join(", ")
            )));
        }

        if record.ref_count() > 0 {
            tracing::warn!(
                file_id = %id,
                entity_refs = ?record.entity_refs,
                "Force-deleting referenced file"
            );
        }

        release_file(self.files.as_ref(), self.storage.as_ref(), &record).await?;
        Ok(())
    }

    /// Remove a file regardless of references.
    pub async fn release(&self, tenant_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let record = self.get(tenant_id, id).await?;
        release_file(self.files.as_ref(), self.storage.as_ref(), &record).await?;
        Ok(())
    }

    /// Rebuild every file's reference set of a tenant from the documents.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_references(&self, tenant_id: Uuid) -> Result<ReconcileReport, AppError> {
        let start = Instant::now();
        let mut refs: HashMap<Uuid, BTreeSet<String>> = HashMap::new();
        let mut report = ReconcileReport::default();
        let mut after = None;

        loop {
            let batch = self
                .entities
                .list_tenant_batch(tenant_id, after, RECONCILE_BATCH)
                .await?;
            report.entities_scanned += batch.len();

            for entity in &batch {
                for file_id in extract_file_ids(&entity.data) {
                    refs.entry(file_id)
                        .or_default()
                        .insert(entity.entity_ref().to_string());
                }
            }

            match batch.last() {
                Some(last) if batch.len() as i64 == RECONCILE_BATCH => after = Some(last.id),
                _ => break,
            }
        }

        let file_ids = self.files.list_ids_for_tenant(tenant_id).await?;
        report.files_checked = file_ids.len();

        let updates: Vec<(Uuid, Vec<String>)> = file_ids
            .into_iter()
            .map(|id| {
                let set = refs.remove(&id).unwrap_or_default();
                (id, set.into_iter().collect())
            })
            .collect();
        report.files_updated = self.files.set_references(tenant_id, &updates).await?;

        tracing::info!(
            tenant_id = %tenant_id,
            entities_scanned = report.entities_scanned,
            files_checked = report.files_checked,
            files_updated = report.files_updated,
            dangling_tokens = refs.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "File references reconciled"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockEntityStore, MockFileStore, MockStorage};
    use bizdesk_core::file_token;
    use bizdesk_processing::ThumbnailConfig;
    use image::{ImageFormat, Rgb, RgbImage};
    use serde_json::json;
    use std::io::Cursor;

    struct Fixture {
        files: MockFileStore,
        entities: MockEntityStore,
        storage: MockStorage,
        service: FileService,
    }

    fn fixture_with(config: ThumbnailConfig, allowed: Vec<String>) -> Fixture {
        let files = MockFileStore::new();
        let entities = MockEntityStore::new();
        let storage = MockStorage::new();
        let service = FileService::new(
            Arc::new(files.clone()),
            Arc::new(entities.clone()),
            Arc::new(storage.clone()),
            FileValidator::new(1024 * 1024, allowed),
            Arc::new(ThumbnailPipeline::new(config).unwrap()),
        );
        Fixture {
            files,
            entities,
            storage,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(ThumbnailConfig::default(), vec![])
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        RgbImage::from_pixel(width, height, Rgb([10, 120, 200]))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn image_upload_stores_original_and_thumbnail() {
        let f = fixture();
        let tenant = Uuid::new_v4();
        let data = png(640, 480);

        let record = f
            .service
            .upload(tenant, "logo société.png", Some("application/octet-stream"), data.clone())
            .await
            .unwrap();

        assert_eq!(record.content_type, "image/png");
        assert_eq!(record.original_filename, "logo société.png");
        assert_eq!(record.file_size, data.len() as i64);
        assert_eq!(record.checksum, hex::encode(Sha256::digest(&data)));
        assert!(record.storage_key.starts_with(&format!("files/{}/", tenant)));
        assert_eq!(
            record.thumbnail_key.as_deref(),
            Some(thumbnail_key(tenant, record.id, "jpg").as_str())
        );
        assert_eq!(record.thumbnail_content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(f.storage.keys().len(), 2);

        let thumb = f.service.thumbnail(tenant, record.id).await.unwrap();
        assert_eq!(thumb.content_type, "image/jpeg");
        let original = f.service.download(tenant, record.id).await.unwrap();
        assert_eq!(original.data, data);
    }

    #[tokio::test]
    async fn failed_conversion_still_uploads() {
        let f = fixture_with(
            ThumbnailConfig {
                pdftoppm_path: "bizdesk-missing-pdftoppm".to_string(),
                ..ThumbnailConfig::default()
            },
            vec![],
        );
        let tenant = Uuid::new_v4();

        let record = f
            .service
            .upload(tenant, "devis.pdf", None, b"%PDF-1.7\n%%EOF".to_vec())
            .await
            .unwrap();

        assert_eq!(record.content_type, "application/pdf");
        assert!(!record.has_thumbnail());
        assert!(matches!(
            f.service.thumbnail(tenant, record.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejected_uploads_store_nothing() {
        let f = fixture_with(ThumbnailConfig::default(), vec!["application/pdf".to_string()]);
        let tenant = Uuid::new_v4();

        assert!(matches!(
            f.service.upload(tenant, "a.txt", None, vec![]).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            f.service.upload(tenant, "big.pdf", None, vec![b'%'; 2 * 1024 * 1024]).await,
            Err(AppError::PayloadTooLarge(_))
        ));
        assert!(matches!(
            f.service
                .upload(tenant, "setup.exe", None, b"MZ\x90\0\x03\0\0\0".to_vec())
                .await,
            Err(AppError::UnsupportedMediaType(_))
        ));
        assert!(matches!(
            f.service.upload(tenant, "notes.txt", None, b"hello".to_vec()).await,
            Err(AppError::UnsupportedMediaType(_))
        ));
        assert!(f.storage.keys().is_empty());
        assert!(f.files.is_empty());
    }

    #[tokio::test]
    async fn thumbnail_store_failure_removes_original() {
        let f = fixture();
        f.storage.fail_uploads_matching("/thumbnails/");

        let err = f
            .service
            .upload(Uuid::new_v4(), "photo.png", None, png(300, 300))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
        assert!(f.storage.keys().is_empty());
        assert!(f.files.is_empty());
    }

    #[tokio::test]
    async fn database_failure_removes_stored_objects() {
        let f = fixture();
        f.files.fail_creates();

        let result = f
            .service
            .upload(Uuid::new_v4(), "photo.png", None, png(300, 300))
            .await;

        assert!(result.is_err());
        assert!(f.storage.keys().is_empty());
    }

    #[tokio::test]
    async fn referenced_files_need_force_to_delete() {
        let f = fixture();
        let tenant = Uuid::new_v4();
        let record = f
            .service
            .upload(tenant, "scan.pdf", None, b"%PDF-1.4 scan".to_vec())
            .await
            .unwrap();
        f.files
            .add_reference(tenant, record.id, "invoices/abc")
            .await
            .unwrap();

        assert!(matches!(
            f.service.delete(tenant, record.id, false).await,
            Err(AppError::Conflict(_))
        ));
        f.service.delete(tenant, record.id, true).await.unwrap();

        assert!(f.files.get_record(record.id).is_none());
        assert!(!f.storage.contains(&record.storage_key));
    }

    #[tokio::test]
    async fn files_of_other_tenants_are_invisible() {
        let f = fixture();
        let tenant = Uuid::new_v4();
        let record = f
            .service
            .upload(tenant, "a.csv", None, b"a,b\n1,2\n".to_vec())
            .await
            .unwrap();
        let other = Uuid::new_v4();

        assert!(matches!(
            f.service.get(other, record.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            f.service.download(other, record.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            f.service.delete(other, record.id, true).await,
            Err(AppError::NotFound(_))
        ));
        assert!(f.service.list(other, None, None).await.unwrap().is_empty());
        assert_eq!(f.service.list(tenant, None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn release_ignores_references() {
        let f = fixture();
        let tenant = Uuid::new_v4();
        let record = f
            .service
            .upload(tenant, "a.csv", None, b"a,b\n".to_vec())
            .await
            .unwrap();
        f.files
            .add_reference(tenant, record.id, "quotes/q1")
            .await
            .unwrap();

        f.service.release(tenant, record.id).await.unwrap();
        assert!(f.files.get_record(record.id).is_none());
    }

    #[tokio::test]
    async fn reconcile_rebuilds_reference_sets() {
        let f = fixture();
        let tenant = Uuid::new_v4();
        let kept = f
            .service
            .upload(tenant, "kept.csv", None, b"a\n".to_vec())
            .await
            .unwrap();
        let stale = f
            .service
            .upload(tenant, "stale.csv", None, b"b\n".to_vec())
            .await
            .unwrap();

        // Stale reference left behind by a document edited outside the triggers.
        f.files
            .add_reference(tenant, stale.id, "invoices/gone")
            .await
            .unwrap();
        let invoice = f
            .entities
            .create(
                tenant,
                "invoices",
                &json!({"attachments": [file_token(kept.id), file_token(Uuid::new_v4())]}),
            )
            .await
            .unwrap();

        let report = f.service.reconcile_references(tenant).await.unwrap();

        assert_eq!(
            report,
            ReconcileReport {
                entities_scanned: 1,
                files_checked: 2,
                files_updated: 2,
            }
        );
        assert_eq!(
            f.files.get_record(kept.id).unwrap().entity_refs,
            vec![invoice.entity_ref().to_string()]
        );
        assert!(f.files.get_record(stale.id).unwrap().entity_refs.is_empty());

        // Running again finds nothing to change.
        let again = f.service.reconcile_references(tenant).await.unwrap();
        assert_eq!(again.files_updated, 0);
    }

    #[tokio::test]
    async fn reconcile_ignores_reference_order() {
        let f = fixture();
        let tenant = Uuid::new_v4();
        let shared = f
            .service
            .upload(tenant, "shared.csv", None, b"a\n".to_vec())
            .await
            .unwrap();
        let legacy = f
            .service
            .upload(tenant, "legacy.csv", None, b"b\n".to_vec())
            .await
            .unwrap();

        let quote = f
            .entities
            .create(
                tenant,
                "quotes",
                &json!({"files": [file_token(shared.id), file_token(legacy.id)]}),
            )
            .await
            .unwrap();
        let invoice = f
            .entities
            .create(
                tenant,
                "invoices",
                &json!({"files": [file_token(shared.id), file_token(legacy.id)]}),
            )
            .await
            .unwrap();

        // References arrive in event order, quote first.
        for entity in [&quote, &invoice] {
            f.files
                .add_reference(tenant, shared.id, &entity.entity_ref().to_string())
                .await
                .unwrap();
        }
        // A row written before sets were kept sorted.
        let mut unsorted = f.files.get_record(legacy.id).unwrap();
        unsorted.entity_refs = vec![quote.entity_ref().to_string(), invoice.entity_ref().to_string()];
        f.files.insert(unsorted);

        let report = f.service.reconcile_references(tenant).await.unwrap();

        assert_eq!(report.files_checked, 2);
        assert_eq!(report.files_updated, 0);
        assert_eq!(
            f.files.get_record(shared.id).unwrap().entity_refs,
            vec![invoice.entity_ref().to_string(), quote.entity_ref().to_string()]
        );
    }
}
