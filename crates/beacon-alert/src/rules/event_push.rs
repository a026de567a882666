use super::RECENT_WINDOW_MINUTES;
use crate::config::EventPushConfig;
use crate::{Evaluator, Result};
use async_trait::async_trait;
use beacon_common::format::format_count;
use beacon_common::{Firing, NotificationRule, RuleType};
use beacon_query::QueryEngine;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Fires once per configured event that occurred in the last five minutes.
pub struct EventPushEvaluator {
    query: Arc<dyn QueryEngine>,
}

impl EventPushEvaluator {
    pub fn new(query: Arc<dyn QueryEngine>) -> Self {
        Self { query }
    }
}

#[async_trait]
impl Evaluator for EventPushEvaluator {
    fn rule_types(&self) -> &[RuleType] {
        &[RuleType::EventPush]
    }

    async fn evaluate(&self, rule: &NotificationRule, now: DateTime<Utc>) -> Result<Vec<Firing>> {
        let config = EventPushConfig::from_rule(rule);
        if config.event_names.is_empty() {
            tracing::warn!(rule_id = %rule.id, "event_push rule has no event names, skipping");
            return Ok(Vec::new());
        }

        let since = now - Duration::minutes(RECENT_WINDOW_MINUTES);
        let rows = self
            .query
            .event_counts(std::slice::from_ref(&rule.app_id), since)
            .await?;

        let mut firings = Vec::new();
        for name in &config.event_names {
            let count: i64 = rows
                .iter()
                .filter(|r| r.app_id == rule.app_id && &r.event_name == name)
                .map(|r| r.count)
                .sum();
            if count <= 0 {
                continue;
            }
            let dedup_key = config
                .dedup
                .then(|| format!("event_push:{}:{}", rule.id, name));
            firings.push(
                Firing::new(
                    format!("Event: {name}"),
                    format!(
                        "{} occurrence(s) of '{}' in the last {} minutes.",
                        format_count(count),
                        name,
                        RECENT_WINDOW_MINUTES
                    ),
                )
                .dedup(dedup_key, config.dedup_window_minutes),
            );
        }
        Ok(firings)
    }
}
