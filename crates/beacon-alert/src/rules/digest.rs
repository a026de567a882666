use super::DAILY_DEDUP_MINUTES;
use crate::config::{DigestConfig, DigestSchedule};
use crate::{Evaluator, Result};
use async_trait::async_trait;
use beacon_common::format::{date_stamp, format_count};
use beacon_common::{Firing, NotificationRule, RuleType};
use beacon_query::QueryEngine;
use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use std::sync::Arc;

/// Summarizes events, sessions and unique users over the trailing day or
/// week. Weekly digests only run on their designated weekday.
pub struct DigestEvaluator {
    query: Arc<dyn QueryEngine>,
    default_weekly_day: Weekday,
}

impl DigestEvaluator {
    pub fn new(query: Arc<dyn QueryEngine>, default_weekly_day: Weekday) -> Self {
        Self {
            query,
            default_weekly_day,
        }
    }
}

#[async_trait]
impl Evaluator for DigestEvaluator {
    fn rule_types(&self) -> &[RuleType] {
        &[RuleType::ScheduledDigest]
    }

    async fn evaluate(&self, rule: &NotificationRule, now: DateTime<Utc>) -> Result<Vec<Firing>> {
        let config = DigestConfig::from_rule(rule, self.default_weekly_day);
        if config.schedule == DigestSchedule::Weekly && now.weekday() != config.weekly_day {
            tracing::debug!(
                rule_id = %rule.id,
                weekly_day = %config.weekly_day,
                "Weekly digest not due today"
            );
            return Ok(Vec::new());
        }

        let date_to = now.date_naive();
        let date_from = date_to - Duration::days(config.schedule.lookback_days());
        let summary = self.query.digest(&rule.app_id, date_from, date_to).await?;

        let message = format!(
            "Events: {}\nSessions: {}\nUnique Users: {}",
            format_count(summary.events),
            format_count(summary.sessions),
            format_count(summary.users)
        );
        let dedup_key = format!("digest:{}:{}", rule.id, date_stamp(date_to));
        Ok(vec![Firing::new(
            format!("{} Digest", config.schedule.label()),
            message,
        )
        .dedup(Some(dedup_key), DAILY_DEDUP_MINUTES)])
    }
}
