//! Typed, per-rule-type configuration parsed from the stored JSON document.
//!
//! Parsing is lenient: a missing field or a field of the wrong JSON type
//! falls back to its default. Only fields without a meaningful default
//! (the threshold's event name and limit) produce an error.

use crate::error::{AlertError, Result};
use beacon_common::NotificationRule;
use chrono::Weekday;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

pub const DEFAULT_DEDUP_WINDOW_MINUTES: u32 = 60;
pub const DEFAULT_DEAD_APP_HOURS: u32 = 24;

/// Reads `key` as `T`, treating a missing or mistyped value as absent.
fn field<T: DeserializeOwned>(config: &Value, key: &str) -> Option<T> {
    config
        .get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn invalid(rule: &NotificationRule, reason: impl Into<String>) -> AlertError {
    AlertError::InvalidConfig {
        rule_id: rule.id.clone(),
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPushConfig {
    pub event_names: Vec<String>,
    pub dedup: bool,
    pub dedup_window_minutes: u32,
}

impl EventPushConfig {
    /// Accepts `event_names` as an array; a lone `event_name` string is
    /// treated as a one-element list. Blank and repeated names are dropped.
    pub fn from_rule(rule: &NotificationRule) -> Self {
        let config = rule.config_value();
        let mut names: Vec<String> = field::<Vec<Value>>(&config, "event_names")
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        if let Some(single) = field::<String>(&config, "event_name") {
            names.push(single);
        }

        let mut event_names: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.trim().to_string();
            if !name.is_empty() && !event_names.contains(&name) {
                event_names.push(name);
            }
        }

        Self {
            event_names,
            dedup: field(&config, "dedup").unwrap_or(false),
            dedup_window_minutes: field(&config, "dedup_window_minutes")
                .unwrap_or(DEFAULT_DEDUP_WINDOW_MINUTES),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Hour,
    Day,
}

impl Period {
    fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" | "hourly" => Self::Hour,
            _ => Self::Day,
        }
    }

    pub fn dedup_window_minutes(&self) -> u32 {
        match self {
            Self::Hour => 60,
            Self::Day => 1440,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hour => f.write_str("hour"),
            Self::Day => f.write_str("day"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdConfig {
    pub event_name: String,
    pub threshold: i64,
    pub period: Period,
}

impl ThresholdConfig {
    pub fn from_rule(rule: &NotificationRule) -> Result<Self> {
        let config = rule.config_value();
        let event_name = field::<String>(&config, "event_name")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid(rule, "missing event_name"))?;
        let threshold = field::<i64>(&config, "threshold")
            .ok_or_else(|| invalid(rule, "missing or non-integer threshold"))?;
        let period = field::<String>(&config, "period")
            .map(|p| Period::parse(&p))
            .unwrap_or(Period::Day);
        Ok(Self {
            event_name,
            threshold,
            period,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadAppConfig {
    pub hours: u32,
}

impl DeadAppConfig {
    pub fn from_rule(rule: &NotificationRule) -> Self {
        let hours = field::<u32>(&rule.config_value(), "hours")
            .filter(|h| *h > 0)
            .unwrap_or(DEFAULT_DEAD_APP_HOURS);
        Self { hours }
    }
}

/// How far today's volume may drift from the trailing mean before alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    Low,
    Medium,
    High,
}

impl Sensitivity {
    fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }

    /// Standard deviations required to fire.
    pub fn sigma(&self) -> f64 {
        match self {
            Self::Low => 3.0,
            Self::Medium => 2.0,
            Self::High => 1.5,
        }
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("low"),
            Self::Medium => f.write_str("medium"),
            Self::High => f.write_str("high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeAnomalyConfig {
    pub sensitivity: Sensitivity,
}

impl VolumeAnomalyConfig {
    pub fn from_rule(rule: &NotificationRule) -> Self {
        let sensitivity = field::<String>(&rule.config_value(), "sensitivity")
            .map(|s| Sensitivity::parse(&s))
            .unwrap_or(Sensitivity::Medium);
        Self { sensitivity }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestSchedule {
    Daily,
    Weekly,
}

impl DigestSchedule {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
        }
    }

    pub fn lookback_days(&self) -> i64 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestConfig {
    pub schedule: DigestSchedule,
    /// Only meaningful for weekly digests.
    pub weekly_day: Weekday,
}

impl DigestConfig {
    pub fn from_rule(rule: &NotificationRule, default_weekly_day: Weekday) -> Self {
        let config = rule.config_value();
        let schedule = match field::<String>(&config, "schedule")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("weekly") => DigestSchedule::Weekly,
            _ => DigestSchedule::Daily,
        };
        let weekly_day = field::<String>(&config, "weekly_day")
            .and_then(|d| d.trim().parse::<Weekday>().ok())
            .unwrap_or(default_weekly_day);
        Self {
            schedule,
            weekly_day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_common::RuleType;
    use chrono::Utc;

    fn rule(rule_type: RuleType, config_json: &str) -> NotificationRule {
        let now = Utc::now();
        NotificationRule {
            id: "rule-1".into(),
            app_id: "app-a".into(),
            rule_type,
            config_json: config_json.into(),
            enabled: true,
            channel_ids: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn event_push_accepts_single_name_and_defaults() {
        let cfg = EventPushConfig::from_rule(&rule(RuleType::EventPush, r#"{"event_name":"signup"}"#));
        assert_eq!(cfg.event_names, vec!["signup"]);
        assert!(!cfg.dedup);
        assert_eq!(cfg.dedup_window_minutes, 60);

        let cfg = EventPushConfig::from_rule(&rule(
            RuleType::EventPush,
            r#"{"event_names":["a"," ","a","b",3],"dedup":true,"dedup_window_minutes":15}"#,
        ));
        assert_eq!(cfg.event_names, vec!["a", "b"]);
        assert!(cfg.dedup);
        assert_eq!(cfg.dedup_window_minutes, 15);
    }

    #[test]
    fn mistyped_fields_fall_back_to_defaults() {
        let cfg = EventPushConfig::from_rule(&rule(
            RuleType::EventPush,
            r#"{"event_names":"oops","dedup":"yes","dedup_window_minutes":-5}"#,
        ));
        assert!(cfg.event_names.is_empty());
        assert!(!cfg.dedup);
        assert_eq!(cfg.dedup_window_minutes, 60);

        let cfg = DeadAppConfig::from_rule(&rule(RuleType::DeadApp, r#"{"hours":"six"}"#));
        assert_eq!(cfg.hours, 24);

        let cfg = VolumeAnomalyConfig::from_rule(&rule(RuleType::VolumeAnomaly, "garbage"));
        assert_eq!(cfg.sensitivity, Sensitivity::Medium);
    }

    #[test]
    fn threshold_requires_event_and_limit() {
        let cfg = ThresholdConfig::from_rule(&rule(
            RuleType::Threshold,
            r#"{"event_name":"error","threshold":1000,"period":"hour"}"#,
        ))
        .unwrap();
        assert_eq!(cfg.period, Period::Hour);
        assert_eq!(cfg.threshold, 1000);

        let cfg = ThresholdConfig::from_rule(&rule(
            RuleType::Threshold,
            r#"{"event_name":"error","threshold":5,"period":"fortnight"}"#,
        ))
        .unwrap();
        assert_eq!(cfg.period, Period::Day);

        assert!(ThresholdConfig::from_rule(&rule(RuleType::Threshold, r#"{"threshold":5}"#)).is_err());
        assert!(ThresholdConfig::from_rule(&rule(RuleType::Threshold, r#"{"event_name":"e"}"#)).is_err());
    }

    #[test]
    fn sensitivity_tiers() {
        assert_eq!(Sensitivity::Low.sigma(), 3.0);
        assert_eq!(Sensitivity::Medium.sigma(), 2.0);
        assert_eq!(Sensitivity::High.sigma(), 1.5);
        let cfg = VolumeAnomalyConfig::from_rule(&rule(RuleType::VolumeAnomaly, r#"{"sensitivity":"HIGH"}"#));
        assert_eq!(cfg.sensitivity, Sensitivity::High);
    }

    #[test]
    fn digest_weekly_day_falls_back_to_default() {
        let cfg = DigestConfig::from_rule(
            &rule(RuleType::ScheduledDigest, r#"{"schedule":"weekly"}"#),
            Weekday::Mon,
        );
        assert_eq!(cfg.schedule, DigestSchedule::Weekly);
        assert_eq!(cfg.weekly_day, Weekday::Mon);

        let cfg = DigestConfig::from_rule(
            &rule(RuleType::ScheduledDigest, r#"{"schedule":"weekly","weekly_day":"friday"}"#),
            Weekday::Mon,
        );
        assert_eq!(cfg.weekly_day, Weekday::Fri);

        let cfg = DigestConfig::from_rule(&rule(RuleType::ScheduledDigest, "{}"), Weekday::Mon);
        assert_eq!(cfg.schedule, DigestSchedule::Daily);
    }
}
