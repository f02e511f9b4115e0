use bizdesk_core::models::{Entity, EntityRef};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityEventKind {
    Created,
    Updated,
    Deleted,
}

impl EntityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityEventKind::Created => "created",
            EntityEventKind::Updated => "updated",
            EntityEventKind::Deleted => "deleted",
        }
    }
}

/// A persisted entity mutation.
///
/// `before` is `None` on creation and `after` is `None` on deletion.
#[derive(Debug, Clone)]
pub struct EntityEvent {
    pub tenant_id: Uuid,
    pub table: String,
    pub entity_id: Uuid,
    pub kind: EntityEventKind,
    pub before: Option<JsonValue>,
    pub after: Option<JsonValue>,
}

impl EntityEvent {
    pub fn created(entity: &Entity) -> Self {
        Self {
            tenant_id: entity.tenant_id,
            table: entity.table.clone(),
            entity_id: entity.id,
            kind: EntityEventKind::Created,
            before: None,
            after: Some(entity.data.clone()),
        }
    }

    pub fn updated(before: &Entity, after: &Entity) -> Self {
        Self {
            tenant_id: after.tenant_id,
            table: after.table.clone(),
            entity_id: after.id,
            kind: EntityEventKind::Updated,
            before: Some(before.data.clone()),
            after: Some(after.data.clone()),
        }
    }

    pub fn deleted(entity: &Entity) -> Self {
        Self {
            tenant_id: entity.tenant_id,
            table: entity.table.clone(),
            entity_id: entity.id,
            kind: EntityEventKind::Deleted,
            before: Some(entity.data.clone()),
            after: None,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(&self.table, self.entity_id)
    }
}
