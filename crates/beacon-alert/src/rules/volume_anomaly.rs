use super::DAILY_DEDUP_MINUTES;
use crate::config::VolumeAnomalyConfig;
use crate::{Evaluator, Result};
use async_trait::async_trait;
use beacon_common::format::{date_stamp, format_count};
use beacon_common::{Firing, NotificationRule, RuleType};
use beacon_query::QueryEngine;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;

/// Days of daily volume fetched per evaluation, today included.
pub const VOLUME_LOOKBACK_DAYS: i64 = 30;

/// Historical days required before a baseline is trusted.
pub const MIN_HISTORY_DAYS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Spike,
    Drop,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spike => f.write_str("spike"),
            Self::Drop => f.write_str("drop"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anomaly {
    pub mean: f64,
    pub stddev: f64,
    pub z_score: f64,
    pub direction: Direction,
}

/// Mean and population standard deviation of `values`.
pub fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Compares `today` against the historical daily counts.
///
/// Returns `Some` only when the deviation is at least `sigma` standard
/// deviations. Too little history or a flat history (zero variance) never
/// yields an anomaly.
pub fn detect_anomaly(history: &[f64], today: f64, sigma: f64) -> Option<Anomaly> {
    if history.len() < MIN_HISTORY_DAYS {
        return None;
    }
    let (mean, stddev) = mean_and_stddev(history);
    if stddev <= 0.0 {
        return None;
    }
    let z_score = (today - mean).abs() / stddev;
    if z_score < sigma {
        return None;
    }
    let direction = if today > mean {
        Direction::Spike
    } else {
        Direction::Drop
    };
    Some(Anomaly {
        mean,
        stddev,
        z_score,
        direction,
    })
}

pub struct VolumeAnomalyEvaluator {
    query: Arc<dyn QueryEngine>,
}

impl VolumeAnomalyEvaluator {
    pub fn new(query: Arc<dyn QueryEngine>) -> Self {
        Self { query }
    }
}

#[async_trait]
impl Evaluator for VolumeAnomalyEvaluator {
    fn rule_types(&self) -> &[RuleType] {
        &[RuleType::VolumeAnomaly]
    }

    async fn evaluate(&self, rule: &NotificationRule, now: DateTime<Utc>) -> Result<Vec<Firing>> {
        let config = VolumeAnomalyConfig::from_rule(rule);
        let since = now - Duration::days(VOLUME_LOOKBACK_DAYS);
        let rows = self
            .query
            .daily_volume(std::slice::from_ref(&rule.app_id), since)
            .await?;

        let today = now.date_naive();
        let mut history: Vec<_> = rows
            .iter()
            .filter(|r| r.app_id == rule.app_id && r.date < today)
            .map(|r| (r.date, r.count))
            .collect();
        history.sort_by_key(|(date, _)| *date);
        let history: Vec<f64> = history.into_iter().map(|(_, c)| c as f64).collect();
        let today_count: i64 = rows
            .iter()
            .filter(|r| r.app_id == rule.app_id && r.date == today)
            .map(|r| r.count)
            .sum();

        let Some(anomaly) =
            detect_anomaly(&history, today_count as f64, config.sensitivity.sigma())
        else {
            return Ok(Vec::new());
        };

        let dedup_key = format!("volume_anomaly:{}:{}", rule.id, date_stamp(today));
        Ok(vec![Firing::new(
            format!("Volume {} detected", anomaly.direction),
            format!(
                "Today's event count ({}) is {:.1}σ {} from the 30-day average ({}). Sensitivity: {}.",
                format_count(today_count),
                anomaly.z_score,
                anomaly.direction,
                format_count(anomaly.mean.round() as i64),
                config.sensitivity
            ),
        )
        .dedup(Some(dedup_key), DAILY_DEDUP_MINUTES)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_stddev() {
        let (mean, sd) = mean_and_stddev(&[90.0, 100.0, 110.0, 95.0, 105.0, 100.0, 100.0]);
        assert!((mean - 100.0).abs() < 1e-9);
        assert!((sd - (250.0f64 / 7.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn spike_over_varied_history_fires() {
        let history = [90.0, 100.0, 110.0, 95.0, 105.0, 100.0, 100.0];
        let anomaly = detect_anomaly(&history, 250.0, 2.0).unwrap();
        assert_eq!(anomaly.direction, Direction::Spike);
        assert!(anomaly.z_score >= 2.0);
        assert!((anomaly.z_score - 150.0 / (250.0f64 / 7.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn flat_history_never_fires() {
        let history = [100.0; 7];
        assert!(detect_anomaly(&history, 250.0, 2.0).is_none());
        assert!(detect_anomaly(&history, 0.0, 1.5).is_none());
    }

    #[test]
    fn short_history_never_fires() {
        let history = [90.0, 100.0, 110.0, 95.0, 105.0, 100.0];
        assert!(detect_anomaly(&history, 1000.0, 1.5).is_none());
    }

    #[test]
    fn drop_below_mean() {
        let history = [90.0, 100.0, 110.0, 95.0, 105.0, 100.0, 100.0];
        let anomaly = detect_anomaly(&history, 0.0, 3.0).unwrap();
        assert_eq!(anomaly.direction, Direction::Drop);
    }

    #[test]
    fn small_deviation_is_not_anomalous() {
        let history = [90.0, 100.0, 110.0, 95.0, 105.0, 100.0, 100.0];
        assert!(detect_anomaly(&history, 108.0, 2.0).is_none());
    }
}
