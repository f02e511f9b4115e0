//! Bizdesk Services Layer
//!
//! Business orchestration between the HTTP handlers and the stores: entity
//! mutations and the triggers they fire, the upload pipeline, reference
//! reconciliation and the orphan cleanup task. Handlers stay thin and call
//! into these services.

pub mod cleanup;
pub mod entity;
pub mod files;
pub mod statistics;
pub mod triggers;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use cleanup::CleanupService;
pub use entity::EntityService;
pub use files::{FileContent, FileService, ReconcileReport};
pub use statistics::StatisticsService;
pub use triggers::{
    EntityEvent, EntityEventKind, FileReferenceTrigger, StatisticsTrigger, Trigger,
    TriggerFailure, TriggerRegistry, TriggerReport,
};
