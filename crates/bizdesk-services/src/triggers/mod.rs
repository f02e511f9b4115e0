//! Reactive triggers over entity mutations
//!
//! After an entity is created, updated or deleted the [`TriggerRegistry`]
//! offers the change to every registered [`Trigger`]. Triggers keep
//! derived state (file reference sets, statistics) in line with the JSON
//! documents.

mod event;
mod file_refs;
mod registry;
pub(crate) mod statistics;

pub use event::{EntityEvent, EntityEventKind};
pub use file_refs::FileReferenceTrigger;
pub use registry::{Trigger, TriggerFailure, TriggerRegistry, TriggerReport};
pub use statistics::StatisticsTrigger;
