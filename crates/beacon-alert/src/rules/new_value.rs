use super::{DAILY_DEDUP_MINUTES, RECENT_WINDOW_MINUTES};
use crate::{AlertError, Evaluator, Result};
use async_trait::async_trait;
use beacon_common::{Firing, NotificationRule, RuleType};
use beacon_query::QueryEngine;
use beacon_storage::KnownValueTracker;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Detects event names, app versions or countries seen for the first time.
///
/// New values are recorded in the tracker before any firing is returned, so
/// each value is reported at most once per app and dimension even when
/// several rules watch the same dimension.
pub struct NewValueEvaluator {
    query: Arc<dyn QueryEngine>,
    tracker: KnownValueTracker,
}

impl NewValueEvaluator {
    pub fn new(query: Arc<dyn QueryEngine>, tracker: KnownValueTracker) -> Self {
        Self { query, tracker }
    }
}

#[async_trait]
impl Evaluator for NewValueEvaluator {
    fn rule_types(&self) -> &[RuleType] {
        &[
            RuleType::NewEventName,
            RuleType::NewAppVersion,
            RuleType::NewCountry,
        ]
    }

    async fn evaluate(&self, rule: &NotificationRule, now: DateTime<Utc>) -> Result<Vec<Firing>> {
        let value_type = rule
            .rule_type
            .value_type()
            .ok_or_else(|| AlertError::InvalidConfig {
                rule_id: rule.id.clone(),
                reason: format!("{} does not track a value dimension", rule.rule_type),
            })?;

        let since = now - Duration::minutes(RECENT_WINDOW_MINUTES);
        let rows = self
            .query
            .distinct_values(std::slice::from_ref(&rule.app_id), value_type, since)
            .await?;
        let current: BTreeSet<String> = rows
            .into_iter()
            .filter(|r| r.app_id == rule.app_id && !r.value.is_empty())
            .map(|r| r.value)
            .collect();
        if current.is_empty() {
            return Ok(Vec::new());
        }

        let known = self.tracker.known_values(&rule.app_id, value_type)?;
        let new_values: Vec<String> = current
            .into_iter()
            .filter(|v| !known.contains(v))
            .collect();
        if new_values.is_empty() {
            return Ok(Vec::new());
        }

        self.tracker
            .record_new_values(&rule.app_id, value_type, &new_values, now)?;

        let label = value_type.label();
        Ok(new_values
            .into_iter()
            .map(|value| {
                let dedup_key = format!("{}:{}:{}", rule.rule_type, rule.app_id, value);
                Firing::new(
                    format!("New {label} detected"),
                    format!("A new {label} was detected: '{value}'"),
                )
                .dedup(Some(dedup_key), DAILY_DEDUP_MINUTES)
            })
            .collect())
    }
}
