use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bizdesk_core::models::{Entity, EntityStatistic, FileRecord, NewFile};
use bizdesk_core::AppError;
use bizdesk_db::{EntityStore, FileStore, StatisticsStore};
use bizdesk_storage::keys::file_key;
use bizdesk_storage::{ByteStream, Storage, StorageBackend, StorageError, StorageResult};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A pending file row with a storage key under its tenant.
pub fn sample_file(tenant_id: Uuid) -> FileRecord {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let storage_key = file_key(tenant_id, &format!("{}-scan.pdf", id));
    FileRecord {
        id,
        tenant_id,
        original_filename: "scan.pdf".to_string(),
        content_type: "application/pdf".to_string(),
        file_size: 8,
        checksum: "0".repeat(64),
        storage_url: format!("http://localhost/{}", storage_key),
        storage_key,
        thumbnail_key: None,
        thumbnail_content_type: None,
        entity_refs: Vec::new(),
        referenced_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Clone, Default)]
pub struct MockEntityStore {
    entities: Arc<Mutex<HashMap<Uuid, Entity>>>,
}

impl MockEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, tenant_id: Uuid, table: &str, id: Uuid) -> Option<Entity> {
        self.entities
            .lock()
            .unwrap()
            .get(&id)
            .filter(|e| e.tenant_id == tenant_id && e.table == table)
            .cloned()
    }

    fn store(&self, before: Entity, data: JsonValue) -> (Entity, Entity) {
        let mut after = before.clone();
        after.data = data;
        after.updated_at = Utc::now();
        self.entities.lock().unwrap().insert(after.id, after.clone());
        (before, after)
    }
}

#[async_trait]
impl EntityStore for MockEntityStore {
    async fn create(
        &self,
        tenant_id: Uuid,
        table: &str,
        data: &JsonValue,
    ) -> Result<Entity, AppError> {
        let now = Utc::now();
        let entity = Entity {
            id: Uuid::new_v4(),
            tenant_id,
            table: table.to_string(),
            data: data.clone(),
            created_at: now,
            updated_at: now,
        };
        self.entities
            .lock()
            .unwrap()
            .insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn get(
        &self,
        tenant_id: Uuid,
        table: &str,
        id: Uuid,
    ) -> Result<Option<Entity>, AppError> {
        Ok(self.find(tenant_id, table, id))
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        table: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entity>, AppError> {
        let mut entities: Vec<Entity> = self
            .entities
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.table == table)
            .cloned()
            .collect();
        entities.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(entities
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn replace(
        &self,
        tenant_id: Uuid,
        table: &str,
        id: Uuid,
        data: &JsonValue,
    ) -> Result<Option<(Entity, Entity)>, AppError> {
        Ok(self
            .find(tenant_id, table, id)
            .map(|before| self.store(before, data.clone())))
    }

    async fn merge(
        &self,
        tenant_id: Uuid,
        table: &str,
        id: Uuid,
        patch: &JsonValue,
    ) -> Result<Option<(Entity, Entity)>, AppError> {
        Ok(self.find(tenant_id, table, id).map(|before| {
            let mut data = before.data.clone();
            if let (Some(target), Some(patch)) = (data.as_object_mut(), patch.as_object()) {
                for (k, v) in patch {
                    target.insert(k.clone(), v.clone());
                }
            }
            self.store(before, data)
        }))
    }

    async fn delete(
        &self,
        tenant_id: Uuid,
        table: &str,
        id: Uuid,
    ) -> Result<Option<Entity>, AppError> {
        let found = self.find(tenant_id, table, id);
        if found.is_some() {
            self.entities.lock().unwrap().remove(&id);
        }
        Ok(found)
    }

    async fn list_tenant_batch(
        &self,
        tenant_id: Uuid,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Entity>, AppError> {
        let mut entities: Vec<Entity> = self
            .entities
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.tenant_id == tenant_id && after.map_or(true, |a| e.id > a))
            .cloned()
            .collect();
        entities.sort_by_key(|e| e.id);
        entities.truncate(limit as usize);
        Ok(entities)
    }
}

#[derive(Clone, Default)]
pub struct MockFileStore {
    files: Arc<Mutex<HashMap<Uuid, FileRecord>>>,
    fail_creates: Arc<Mutex<bool>>,
}

impl MockFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file: FileRecord) -> FileRecord {
        self.files.lock().unwrap().insert(file.id, file.clone());
        file
    }

    pub fn get_record(&self, id: Uuid) -> Option<FileRecord> {
        self.files.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every later `create` fail as if the database were down.
    pub fn fail_creates(&self) {
        *self.fail_creates.lock().unwrap() = true;
    }

    fn update<F>(&self, tenant_id: Uuid, id: Uuid, f: F) -> Option<FileRecord>
    where
        F: FnOnce(&mut FileRecord),
    {
        let mut files = self.files.lock().unwrap();
        let file = files.get_mut(&id).filter(|f| f.tenant_id == tenant_id)?;
        f(file);
        file.updated_at = Utc::now();
        Some(file.clone())
    }
}

#[async_trait]
impl FileStore for MockFileStore {
    async fn create(&self, file: NewFile) -> Result<FileRecord, AppError> {
        if *self.fail_creates.lock().unwrap() {
            return Err(AppError::Internal("database unavailable".to_string()));
        }
        let now = Utc::now();
        Ok(self.insert(FileRecord {
            id: file.id,
            tenant_id: file.tenant_id,
            original_filename: file.original_filename,
            content_type: file.content_type,
            file_size: file.file_size,
            checksum: file.checksum,
            storage_key: file.storage_key,
            storage_url: file.storage_url,
            thumbnail_key: file.thumbnail_key,
            thumbnail_content_type: file.thumbnail_content_type,
            entity_refs: Vec::new(),
            referenced_at: None,
            created_at: now,
            updated_at: now,
        }))
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        Ok(self.get_record(id).filter(|f| f.tenant_id == tenant_id))
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FileRecord>, AppError> {
        let mut files: Vec<FileRecord> = self
            .files
            .lock()
            .unwrap()
            .values()
            .filter(|f| f.tenant_id == tenant_id)
            .cloned()
            .collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(files
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn add_reference(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        entity_ref: &str,
    ) -> Result<Option<FileRecord>, AppError> {
        Ok(self.update(tenant_id, id, |f| {
            if let Err(at) = f.entity_refs.binary_search_by(|r| r.as_str().cmp(entity_ref)) {
                f.entity_refs.insert(at, entity_ref.to_string());
            }
            f.referenced_at.get_or_insert_with(Utc::now);
        }))
    }

    async fn remove_reference(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        entity_ref: &str,
    ) -> Result<Option<FileRecord>, AppError> {
        Ok(self.update(tenant_id, id, |f| f.entity_refs.retain(|r| r != entity_ref)))
    }

    async fn set_references(
        &self,
        tenant_id: Uuid,
        updates: &[(Uuid, Vec<String>)],
    ) -> Result<u64, AppError> {
        let mut changed = 0;
        for (id, refs) in updates {
            let mut refs = refs.clone();
            refs.sort();
            refs.dedup();
            let current = self.get_record(*id).filter(|f| f.tenant_id == tenant_id);
            if current.is_some_and(|f| {
                let mut stored = f.entity_refs;
                stored.sort();
                stored != refs
            }) {
                self.update(tenant_id, *id, |f| {
                    f.entity_refs = refs.clone();
                    if !refs.is_empty() {
                        f.referenced_at.get_or_insert_with(Utc::now);
                    }
                });
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut files = self.files.lock().unwrap();
        if files.get(&id).is_some_and(|f| f.tenant_id == tenant_id) {
            files.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn delete_unreferenced(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let mut files = self.files.lock().unwrap();
        if files
            .get(&id)
            .is_some_and(|f| f.tenant_id == tenant_id && f.entity_refs.is_empty())
        {
            files.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn list_orphans(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<FileRecord>, AppError> {
        let mut files: Vec<FileRecord> = self
            .files
            .lock()
            .unwrap()
            .values()
            .filter(|f| {
                f.referenced_at.is_none() && f.entity_refs.is_empty() && f.created_at < older_than
            })
            .cloned()
            .collect();
        files.sort_by_key(|f| f.created_at);
        files.truncate(limit as usize);
        Ok(files)
    }

    async fn list_ids_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let mut ids: Vec<Uuid> = self
            .files
            .lock()
            .unwrap()
            .values()
            .filter(|f| f.tenant_id == tenant_id)
            .map(|f| f.id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

type StatKey = (Uuid, String, Option<String>);

#[derive(Clone, Default)]
pub struct MockStatisticsStore {
    rows: Arc<Mutex<HashMap<StatKey, (i64, Decimal)>>>,
    apply_calls: Arc<Mutex<usize>>,
}

impl MockStatisticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, tenant_id: Uuid, table: &str, field: Option<&str>) -> Option<(i64, Decimal)> {
        self.rows
            .lock()
            .unwrap()
            .get(&(tenant_id, table.to_string(), field.map(String::from)))
            .copied()
    }

    pub fn apply_calls(&self) -> usize {
        *self.apply_calls.lock().unwrap()
    }
}

#[async_trait]
impl StatisticsStore for MockStatisticsStore {
    async fn apply(
        &self,
        tenant_id: Uuid,
        table: &str,
        field: Option<&str>,
        count_delta: i64,
        sum_delta: Decimal,
    ) -> Result<(), AppError> {
        *self.apply_calls.lock().unwrap() += 1;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .entry((tenant_id, table.to_string(), field.map(String::from)))
            .or_insert((0, Decimal::ZERO));
        let sum = row.1.checked_add(sum_delta).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Sum of {}.{} would overflow",
                table,
                field.unwrap_or("count")
            ))
        })?;
        row.0 = (row.0 + count_delta).max(0);
        row.1 = sum;
        Ok(())
    }

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<EntityStatistic>, AppError> {
        let mut stats: Vec<EntityStatistic> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|((t, _, _), _)| *t == tenant_id)
            .map(|((t, table, field), (count, sum))| EntityStatistic {
                tenant_id: *t,
                table: table.clone(),
                field: field.clone(),
                count: *count,
                sum: *sum,
                updated_at: Utc::now(),
            })
            .collect();
        stats.sort_by(|a, b| (&a.table, &a.field).cmp(&(&b.table, &b.field)));
        Ok(stats)
    }

    async fn replace(
        &self,
        tenant_id: Uuid,
        table: &str,
        field: Option<&str>,
        count: i64,
        sum: Decimal,
    ) -> Result<(), AppError> {
        self.rows
            .lock()
            .unwrap()
            .insert((tenant_id, table.to_string(), field.map(String::from)), (count, sum));
        Ok(())
    }
}

/// Object storage in a map. Keys containing a poisoned fragment fail to upload.
#[derive(Clone, Default)]
pub struct MockStorage {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    poisoned: Arc<Mutex<Option<String>>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn fail_uploads_matching(&self, fragment: &str) {
        *self.poisoned.lock().unwrap() = Some(fragment.to_string());
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn upload(
        &self,
        tenant_id: Uuid,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<(String, String)> {
        let key = file_key(tenant_id, filename);
        let url = self.upload_with_key(&key, data, content_type).await?;
        Ok((key, url))
    }

    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        if let Some(fragment) = self.poisoned.lock().unwrap().as_deref() {
            if storage_key.contains(fragment) {
                return Err(StorageError::UploadFailed("bucket unavailable".to_string()));
            }
        }
        self.put(storage_key, &data);
        Ok(format!("memory://{}", storage_key))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(storage_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream> {
        let data = self.download(storage_key).await?;
        Ok(Box::pin(futures::stream::once(async move {
            Ok(Bytes::from(data))
        })))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().remove(storage_key);
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.contains(storage_key))
    }

    async fn get_presigned_url(
        &self,
        storage_key: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!("memory://{}", storage_key))
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<String> {
        let data = self.download(from_key).await?;
        self.put(to_key, &data);
        Ok(format!("memory://{}", to_key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
