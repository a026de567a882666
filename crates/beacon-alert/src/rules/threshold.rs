use crate::config::{Period, ThresholdConfig};
use crate::{Evaluator, Result};
use async_trait::async_trait;
use beacon_common::format::{date_stamp, format_count, hour_stamp};
use beacon_common::{Firing, NotificationRule, RuleType};
use beacon_query::QueryEngine;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use std::sync::Arc;

/// Fires when an event's count since the start of the current UTC hour or
/// day exceeds the configured threshold. Deduplicated per period bucket.
pub struct ThresholdEvaluator {
    query: Arc<dyn QueryEngine>,
}

impl ThresholdEvaluator {
    pub fn new(query: Arc<dyn QueryEngine>) -> Self {
        Self { query }
    }
}

pub fn period_start(period: Period, now: DateTime<Utc>) -> DateTime<Utc> {
    let unit = match period {
        Period::Hour => TimeDelta::hours(1),
        Period::Day => TimeDelta::days(1),
    };
    now.duration_trunc(unit).unwrap_or(now)
}

fn period_bucket(period: Period, now: DateTime<Utc>) -> String {
    match period {
        Period::Hour => hour_stamp(now),
        Period::Day => date_stamp(now.date_naive()),
    }
}

#[async_trait]
impl Evaluator for ThresholdEvaluator {
    fn rule_types(&self) -> &[RuleType] {
        &[RuleType::Threshold]
    }

    async fn evaluate(&self, rule: &NotificationRule, now: DateTime<Utc>) -> Result<Vec<Firing>> {
        let config = ThresholdConfig::from_rule(rule)?;
        let since = period_start(config.period, now);
        let rows = self
            .query
            .event_counts(std::slice::from_ref(&rule.app_id), since)
            .await?;

        let count: i64 = rows
            .iter()
            .filter(|r| r.app_id == rule.app_id && r.event_name == config.event_name)
            .map(|r| r.count)
            .sum();
        if count <= config.threshold {
            return Ok(Vec::new());
        }

        let dedup_key = format!("threshold:{}:{}", rule.id, period_bucket(config.period, now));
        Ok(vec![Firing::new(
            format!("Threshold Alert: {}", config.event_name),
            format!(
                "Event '{}' has reached {} occurrences (threshold: {}) in the current {}.",
                config.event_name,
                format_count(count),
                format_count(config.threshold),
                config.period
            ),
        )
        .dedup(Some(dedup_key), config.period.dedup_window_minutes())])
    }
}
