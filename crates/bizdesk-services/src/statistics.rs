use std::collections::HashMap;
use std::sync::Arc;

use bizdesk_core::models::EntityStatistic;
use bizdesk_core::{AppError, StatisticTarget};
use bizdesk_db::{EntityStore, StatisticsStore};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::triggers::statistics::numeric_field;

const RECOMPUTE_BATCH: i64 = 500;

/// Read side of the statistics kept by [`crate::StatisticsTrigger`].
#[derive(Clone)]
pub struct StatisticsService {
    stats: Arc<dyn StatisticsStore>,
    entities: Arc<dyn EntityStore>,
    targets: Vec<StatisticTarget>,
}

impl StatisticsService {
    pub fn new(
        stats: Arc<dyn StatisticsStore>,
        entities: Arc<dyn EntityStore>,
        targets: Vec<StatisticTarget>,
    ) -> Self {
        Self {
            stats,
            entities,
            targets,
        }
    }

    pub fn targets(&self) -> &[StatisticTarget] {
        &self.targets
    }

    pub async fn list(&self, tenant_id: Uuid) -> Result<Vec<EntityStatistic>, AppError> {
        self.stats.list(tenant_id).await
    }

    /// Recount every tracked `(table, field)` of a tenant from its documents.
    #[tracing::instrument(skip(self))]
    pub async fn recompute(&self, tenant_id: Uuid) -> Result<Vec<EntityStatistic>, AppError> {
        let mut totals: HashMap<&StatisticTarget, (i64, Decimal)> =
            self.targets.iter().map(|t| (t, (0, Decimal::ZERO))).collect();
        let mut after = None;

        loop {
            let batch = self
                .entities
                .list_tenant_batch(tenant_id, after, RECOMPUTE_BATCH)
                .await?;

            for entity in &batch {
                for target in self.targets.iter().filter(|t| t.table == entity.table) {
                    if let Some((count, sum)) = totals.get_mut(target) {
                        *count += 1;
                        if let Some(field) = target.field.as_deref() {
                            *sum = sum
                                .checked_add(numeric_field(Some(&entity.data), field))
                                .ok_or_else(|| {
                                    AppError::InvalidInput(format!(
                                        "Sum of {}.{} is out of range",
                                        target.table, field
                                    ))
                                })?;
                        }
                    }
                }
            }

            match batch.last() {
                Some(last) if batch.len() as i64 == RECOMPUTE_BATCH => after = Some(last.id),
                _ => break,
            }
        }

        for (target, (count, sum)) in totals {
            self.stats
                .replace(tenant_id, &target.table, target.field.as_deref(), count, sum)
                .await?;
        }

        tracing::info!(tenant_id = %tenant_id, targets = self.targets.len(), "Statistics recomputed");
        self.stats.list(tenant_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockEntityStore, MockStatisticsStore};
    use bizdesk_core::config::parse_statistic_targets;
    use serde_json::json;

    #[tokio::test]
    async fn recompute_rebuilds_from_documents() {
        let entities = MockEntityStore::new();
        let stats = MockStatisticsStore::new();
        let tenant = Uuid::new_v4();
        for total in [10, 20, 12] {
            entities
                .create(tenant, "invoices", &json!({"total": total}))
                .await
                .unwrap();
        }
        entities
            .create(tenant, "contacts", &json!({"name": "Ada"}))
            .await
            .unwrap();
        entities
            .create(Uuid::new_v4(), "invoices", &json!({"total": 1000}))
            .await
            .unwrap();
        // Drifted value that must be overwritten.
        stats
            .replace(tenant, "invoices", Some("total"), 99, Decimal::new(5, 0))
            .await
            .unwrap();

        let svc = StatisticsService::new(
            Arc::new(stats.clone()),
            Arc::new(entities),
            parse_statistic_targets("invoices:total,contacts,quotes:total").unwrap(),
        );
        let result = svc.recompute(tenant).await.unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(
            stats.value(tenant, "invoices", Some("total")),
            Some((3, Decimal::new(42, 0)))
        );
        assert_eq!(stats.value(tenant, "contacts", None), Some((1, Decimal::ZERO)));
        assert_eq!(stats.value(tenant, "quotes", Some("total")), Some((0, Decimal::ZERO)));
    }

    #[tokio::test]
    async fn recompute_rejects_totals_out_of_range() {
        let entities = MockEntityStore::new();
        let stats = MockStatisticsStore::new();
        let tenant = Uuid::new_v4();
        for _ in 0..2 {
            entities
                .create(tenant, "invoices", &json!({"total": Decimal::MAX.to_string()}))
                .await
                .unwrap();
        }
        stats
            .replace(tenant, "invoices", Some("total"), 7, Decimal::new(70, 0))
            .await
            .unwrap();

        let svc = StatisticsService::new(
            Arc::new(stats.clone()),
            Arc::new(entities),
            parse_statistic_targets("invoices:total").unwrap(),
        );
        let err = svc.recompute(tenant).await.unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
        // Nothing is replaced when a total cannot be represented.
        assert_eq!(
            stats.value(tenant, "invoices", Some("total")),
            Some((7, Decimal::new(70, 0)))
        );
    }
}
