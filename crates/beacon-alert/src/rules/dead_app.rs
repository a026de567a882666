use super::DAILY_DEDUP_MINUTES;
use crate::config::DeadAppConfig;
use crate::{Evaluator, Result};
use async_trait::async_trait;
use beacon_common::format::{date_stamp, format_utc};
use beacon_common::{Firing, NotificationRule, RuleType};
use beacon_query::QueryEngine;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Fires when an app has been silent for at least the configured number of
/// hours. Apps that never recorded an event are left alone.
pub struct DeadAppEvaluator {
    query: Arc<dyn QueryEngine>,
}

impl DeadAppEvaluator {
    pub fn new(query: Arc<dyn QueryEngine>) -> Self {
        Self { query }
    }
}

#[async_trait]
impl Evaluator for DeadAppEvaluator {
    fn rule_types(&self) -> &[RuleType] {
        &[RuleType::DeadApp]
    }

    async fn evaluate(&self, rule: &NotificationRule, now: DateTime<Utc>) -> Result<Vec<Firing>> {
        let config = DeadAppConfig::from_rule(rule);
        let rows = self
            .query
            .last_events(std::slice::from_ref(&rule.app_id))
            .await?;
        let Some(last) = rows
            .iter()
            .filter(|r| r.app_id == rule.app_id)
            .map(|r| r.last_timestamp)
            .max()
        else {
            return Ok(Vec::new());
        };

        let silent_hours = (now - last).num_seconds() as f64 / 3600.0;
        if silent_hours < f64::from(config.hours) {
            return Ok(Vec::new());
        }

        let dedup_key = format!("dead_app:{}:{}", rule.id, date_stamp(now.date_naive()));
        Ok(vec![Firing::new(
            "Dead App Alert",
            format!(
                "No events received for {:.1} hours (threshold: {}h). Last event was at {}.",
                silent_hours,
                config.hours,
                format_utc(last)
            ),
        )
        .dedup(Some(dedup_key), DAILY_DEDUP_MINUTES)])
    }
}
