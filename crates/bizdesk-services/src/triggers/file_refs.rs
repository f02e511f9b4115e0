use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use bizdesk_core::{diff_file_ids, extract_file_ids};
use bizdesk_db::FileStore;
use bizdesk_storage::Storage;

use super::event::EntityEvent;
use super::registry::Trigger;
use crate::files::release_unreferenced_file;

/// Keeps each file's reference set equal to the documents mentioning it.
///
/// A file whose last reference disappears is released: its original,
/// thumbnail and row are deleted.
pub struct FileReferenceTrigger {
    files: Arc<dyn FileStore>,
    storage: Arc<dyn Storage>,
}

impl FileReferenceTrigger {
    pub const NAME: &'static str = "file_references";

    pub fn new(files: Arc<dyn FileStore>, storage: Arc<dyn Storage>) -> Self {
        Self { files, storage }
    }
}

#[async_trait]
impl Trigger for FileReferenceTrigger {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn test(&self, event: &EntityEvent) -> bool {
        [&event.before, &event.after]
            .into_iter()
            .flatten()
            .any(|data| !extract_file_ids(data).is_empty())
    }

    async fn run(&self, event: &EntityEvent) -> anyhow::Result<()> {
        let (added, removed) = diff_file_ids(event.before.as_ref(), event.after.as_ref());
        let entity_ref = event.entity_ref().to_string();

        for file_id in added {
            let updated = self
                .files
                .add_reference(event.tenant_id, file_id, &entity_ref)
                .await
                .with_context(|| format!("adding reference {} to file {}", entity_ref, file_id))?;

            match updated {
                Some(file) => tracing::debug!(
                    file_id = %file_id,
                    entity_ref = %entity_ref,
                    ref_count = file.ref_count(),
                    "File reference added"
                ),
                // Unknown id or a file of another tenant.
                None => tracing::debug!(
                    file_id = %file_id,
                    entity_ref = %entity_ref,
                    "Ignoring reference to unknown file"
                ),
            }
        }

        for file_id in removed {
            let updated = self
                .files
                .remove_reference(event.tenant_id, file_id, &entity_ref)
                .await
                .with_context(|| {
                    format!("removing reference {} from file {}", entity_ref, file_id)
                })?;

            let Some(file) = updated else {
                continue;
            };

            tracing::debug!(
                file_id = %file_id,
                entity_ref = %entity_ref,
                ref_count = file.ref_count(),
                "File reference removed"
            );

            if file.entity_refs.is_empty() {
                release_unreferenced_file(self.files.as_ref(), self.storage.as_ref(), &file)
                    .await
                    .with_context(|| format!("releasing unreferenced file {}", file_id))?;
            }
        }

        Ok(())
    }
}
