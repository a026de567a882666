use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of rule kinds the schedulers know how to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    EventPush,
    Threshold,
    NewEventName,
    NewAppVersion,
    NewCountry,
    DeadApp,
    VolumeAnomaly,
    ScheduledDigest,
}

impl RuleType {
    pub const ALL: [RuleType; 8] = [
        RuleType::EventPush,
        RuleType::Threshold,
        RuleType::NewEventName,
        RuleType::NewAppVersion,
        RuleType::NewCountry,
        RuleType::DeadApp,
        RuleType::VolumeAnomaly,
        RuleType::ScheduledDigest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventPush => "event_push",
            Self::Threshold => "threshold",
            Self::NewEventName => "new_event_name",
            Self::NewAppVersion => "new_app_version",
            Self::NewCountry => "new_country",
            Self::DeadApp => "dead_app",
            Self::VolumeAnomaly => "volume_anomaly",
            Self::ScheduledDigest => "scheduled_digest",
        }
    }

    /// The tracked dimension for first-seen rules, `None` for every other kind.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::NewEventName => Some(ValueType::EventName),
            Self::NewAppVersion => Some(ValueType::AppVersion),
            Self::NewCountry => Some(ValueType::CountryCode),
            _ => None,
        }
    }
}

impl FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown rule type: {s}"))
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery providers. Stored as a plain string on the channel row so that
/// rows written by newer versions still load; parsing happens at resolve time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    /// Chat-bot delivery.
    Telegram,
    /// Push notification to a single user key.
    Pushover,
    /// Topic-based push.
    Ntfy,
}

impl ChannelType {
    pub const ALL: [ChannelType; 3] = [ChannelType::Telegram, ChannelType::Pushover, ChannelType::Ntfy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Pushover => "pushover",
            Self::Ntfy => "ntfy",
        }
    }
}

impl FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "telegram" => Ok(Self::Telegram),
            "pushover" => Ok(Self::Pushover),
            "ntfy" => Ok(Self::Ntfy),
            _ => Err(format!("unknown channel type: {s}")),
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discrete event dimension whose first occurrence per app is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    EventName,
    AppVersion,
    CountryCode,
}

impl ValueType {
    /// Stored value-type tag, which is also the event column queried for
    /// distinct values.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventName => "event_name",
            Self::AppVersion => "app_version",
            Self::CountryCode => "country_code",
        }
    }

    /// Human label used in notification text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::EventName => "event name",
            Self::AppVersion => "app version",
            Self::CountryCode => "country",
        }
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event_name" => Ok(Self::EventName),
            "app_version" => Ok(Self::AppVersion),
            "country_code" => Ok(Self::CountryCode),
            _ => Err(format!("unknown value type: {s}")),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivery destination owned by one app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: String,
    pub app_id: String,
    pub name: String,
    pub channel_type: String,
    /// Provider-specific JSON, validated only when a delivery adapter is built.
    pub config_json: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored rule joined with the ids of the channels it notifies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRule {
    pub id: String,
    pub app_id: String,
    pub rule_type: RuleType,
    pub config_json: String,
    pub enabled: bool,
    pub channel_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationRule {
    /// Parses the stored configuration as a JSON document. An empty or
    /// unparsable string yields an empty object so that evaluators can fall
    /// back to their defaults.
    pub fn config_value(&self) -> serde_json::Value {
        serde_json::from_str(&self.config_json)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }
}

/// One audit row per (firing, channel) delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLogEntry {
    pub id: String,
    pub app_id: String,
    /// `None` for ad-hoc test notifications.
    pub rule_id: Option<String>,
    pub channel_id: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
    pub dedup_key: Option<String>,
}

/// Log row joined with its channel name and rule type, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLogView {
    pub id: String,
    pub rule_id: Option<String>,
    pub channel_id: String,
    pub channel_name: Option<String>,
    pub rule_type: Option<String>,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// A rule's condition being satisfied once, rendered and ready to dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firing {
    pub title: String,
    pub message: String,
    /// Identifies this alert occurrence; `None` disables deduplication.
    pub dedup_key: Option<String>,
    pub dedup_window_minutes: u32,
}

impl Firing {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            dedup_key: None,
            dedup_window_minutes: 0,
        }
    }

    pub fn dedup(mut self, key: Option<String>, window_minutes: u32) -> Self {
        self.dedup_key = key;
        self.dedup_window_minutes = window_minutes;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownValue {
    pub app_id: String,
    pub value_type: ValueType,
    pub value: String,
    pub first_seen_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_type_round_trips_through_str() {
        for rule_type in RuleType::ALL {
            assert_eq!(rule_type.as_str().parse::<RuleType>(), Ok(rule_type));
        }
        assert!("webhook_push".parse::<RuleType>().is_err());
    }

    #[test]
    fn only_new_value_rules_have_a_dimension() {
        assert_eq!(RuleType::NewCountry.value_type(), Some(ValueType::CountryCode));
        assert_eq!(RuleType::NewAppVersion.value_type(), Some(ValueType::AppVersion));
        assert_eq!(RuleType::Threshold.value_type(), None);
    }

    #[test]
    fn malformed_rule_config_reads_as_empty_object() {
        let now = Utc::now();
        let rule = NotificationRule {
            id: "r1".into(),
            app_id: "app".into(),
            rule_type: RuleType::DeadApp,
            config_json: "{not json".into(),
            enabled: true,
            channel_ids: vec![],
            created_at: now,
            updated_at: now,
        };
        assert_eq!(rule.config_value(), serde_json::json!({}));
    }
}
