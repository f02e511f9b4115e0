use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use bizdesk_core::StatisticTarget;
use bizdesk_db::StatisticsStore;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use super::event::{EntityEvent, EntityEventKind};
use super::registry::Trigger;

/// Numeric value of `field` in a document: JSON numbers and numeric strings
/// count, anything else is zero.
pub(crate) fn numeric_field(data: Option<&JsonValue>, field: &str) -> Decimal {
    let parse = |s: &str| {
        let s = s.trim();
        Decimal::from_str(s)
            .or_else(|_| Decimal::from_scientific(s))
            .ok()
    };

    match data.and_then(|d| d.get(field)) {
        Some(JsonValue::Number(n)) => parse(&n.to_string()),
        Some(JsonValue::String(s)) => parse(s),
        _ => None,
    }
    .unwrap_or(Decimal::ZERO)
}

/// Running document counts and field totals for the configured tables.
pub struct StatisticsTrigger {
    targets: Vec<StatisticTarget>,
    stats: Arc<dyn StatisticsStore>,
}

impl StatisticsTrigger {
    pub const NAME: &'static str = "statistics";

    pub fn new(targets: Vec<StatisticTarget>, stats: Arc<dyn StatisticsStore>) -> Self {
        Self { targets, stats }
    }
}

#[async_trait]
impl Trigger for StatisticsTrigger {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn test(&self, event: &EntityEvent) -> bool {
        self.targets.iter().any(|t| t.table == event.table)
    }

    async fn run(&self, event: &EntityEvent) -> anyhow::Result<()> {
        let count_delta = match event.kind {
            EntityEventKind::Created => 1,
            EntityEventKind::Updated => 0,
            EntityEventKind::Deleted => -1,
        };

        for target in self.targets.iter().filter(|t| t.table == event.table) {
            let sum_delta = match target.field.as_deref() {
                Some(field) => numeric_field(event.after.as_ref(), field)
                    .checked_sub(numeric_field(event.before.as_ref(), field))
                    .ok_or_else(|| {
                        anyhow::anyhow!("change of {}.{} is out of range", target.table, field)
                    })?,
                None => Decimal::ZERO,
            };

            if count_delta == 0 && sum_delta.is_zero() {
                continue;
            }

            self.stats
                .apply(
                    event.tenant_id,
                    &target.table,
                    target.field.as_deref(),
                    count_delta,
                    sum_delta,
                )
                .await
                .with_context(|| format!("updating statistics for {}", target.table))?;
        }

        Ok(())
    }
}
