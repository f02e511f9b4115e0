use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::event::EntityEvent;

/// A side effect attached to entity mutations.
#[async_trait]
pub trait Trigger: Send + Sync {
    /// Unique within a registry.
    fn name(&self) -> &str;

    /// Cheap filter evaluated for every event before [`Trigger::run`].
    fn test(&self, event: &EntityEvent) -> bool;

    async fn run(&self, event: &EntityEvent) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerFailure {
    pub trigger: String,
    pub error: String,
}

/// What happened to one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerReport {
    pub ran: Vec<String>,
    pub skipped: Vec<String>,
    pub failures: Vec<TriggerFailure>,
}

impl TriggerReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered set of triggers run after each persisted mutation.
///
/// Triggers run one after the other in registration order. A failure is
/// recorded and logged; it neither stops later triggers nor undoes the
/// mutation.
#[derive(Clone, Default)]
pub struct TriggerRegistry {
    triggers: Arc<RwLock<Vec<Arc<dyn Trigger>>>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trigger at the end, or swap it in place when the name is taken.
    /// Returns `true` when an existing trigger was replaced.
    pub async fn register(&self, trigger: Arc<dyn Trigger>) -> bool {
        let mut triggers = self.triggers.write().await;
        if let Some(slot) = triggers.iter_mut().find(|t| t.name() == trigger.name()) {
            tracing::debug!(trigger = trigger.name(), "Replacing registered trigger");
            *slot = trigger;
            return true;
        }
        tracing::debug!(trigger = trigger.name(), "Trigger registered");
        triggers.push(trigger);
        false
    }

    pub async fn unregister(&self, name: &str) -> bool {
        let mut triggers = self.triggers.write().await;
        let before = triggers.len();
        triggers.retain(|t| t.name() != name);
        triggers.len() != before
    }

    pub async fn names(&self) -> Vec<String> {
        self.triggers
            .read()
            .await
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }

    #[tracing::instrument(
        skip(self, event),
        fields(
            tenant_id = %event.tenant_id,
            table = %event.table,
            entity_id = %event.entity_id,
            kind = event.kind.as_str()
        )
    )]
    pub async fn dispatch(&self, event: &EntityEvent) -> TriggerReport {
        // Run on a snapshot so registration never waits on a slow trigger.
        let triggers: Vec<Arc<dyn Trigger>> = self.triggers.read().await.clone();
        let mut report = TriggerReport::default();

        for trigger in triggers {
            let name = trigger.name().to_string();
            if !trigger.test(event) {
                report.skipped.push(name);
                continue;
            }

            let start = Instant::now();
            match trigger.run(event).await {
                Ok(()) => {
                    tracing::debug!(
                        trigger = %name,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Trigger completed"
                    );
                    report.ran.push(name);
                }
                Err(e) => {
                    tracing::warn!(trigger = %name, error = %format!("{:#}", e), "Trigger failed");
                    report.failures.push(TriggerFailure {
                        trigger: name,
                        error: format!("{:#}", e),
                    });
                }
            }
        }

        report
    }
}
