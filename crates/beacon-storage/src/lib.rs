//! Persistence for notification rules, channels, the delivery audit log and
//! first-seen value markers.
//!
//! The default implementation ([`sqlite::SqliteNotificationStore`]) keeps all
//! five tables in a single SQLite database in WAL mode. The dispatcher's
//! dedup and rate-limit checks are plain reads against the append-only
//! `notification_log` table, so two concurrent firings can both pass a check
//! before either writes its row.

pub mod error;
pub mod known_values;
pub mod sqlite;

#[cfg(test)]
mod tests;

use beacon_common::{
    KnownValue, NotificationChannel, NotificationLogEntry, NotificationLogView, NotificationRule,
    RuleType, ValueType,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use error::{Result, StorageError};
pub use known_values::KnownValueTracker;
pub use sqlite::SqliteNotificationStore;

/// Fields supplied when creating a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChannel {
    pub app_id: String,
    pub name: String,
    pub channel_type: String,
    pub config_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelUpdate {
    pub name: String,
    pub config_json: String,
    pub enabled: bool,
}

/// Fields supplied when creating a rule. Every channel id must belong to
/// `app_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRule {
    pub app_id: String,
    pub rule_type: RuleType,
    pub config_json: String,
    #[serde(default)]
    pub channel_ids: Vec<String>,
}

/// Replaces a rule's configuration, enabled flag and full channel set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleUpdate {
    pub config_json: String,
    pub enabled: bool,
    #[serde(default)]
    pub channel_ids: Vec<String>,
}

/// Storage backend consumed by the schedulers, dispatcher and management
/// service.
///
/// Implementations must be safe to share across threads (`Send + Sync`)
/// because all three schedulers and the management surface use the same
/// instance concurrently.
pub trait NotificationStore: Send + Sync {
    fn list_channels(&self, app_id: &str) -> Result<Vec<NotificationChannel>>;

    /// Looks up a channel scoped to its owning app.
    fn get_channel(&self, app_id: &str, channel_id: &str) -> Result<Option<NotificationChannel>>;

    fn insert_channel(&self, channel: &NewChannel) -> Result<NotificationChannel>;

    fn update_channel(&self, channel_id: &str, update: &ChannelUpdate) -> Result<()>;

    /// Deletes a channel together with every rule link pointing at it.
    fn delete_channel(&self, channel_id: &str) -> Result<()>;

    fn list_rules(&self, app_id: &str) -> Result<Vec<NotificationRule>>;

    fn get_rule(&self, app_id: &str, rule_id: &str) -> Result<Option<NotificationRule>>;

    fn insert_rule(&self, rule: &NewRule) -> Result<NotificationRule>;

    fn update_rule(&self, rule_id: &str, update: &RuleUpdate) -> Result<()>;

    fn delete_rule(&self, rule_id: &str) -> Result<()>;

    /// Returns every enabled rule whose type is in `rule_types`, joined with
    /// its channel ids, in creation order.
    fn enabled_rules_by_type(&self, rule_types: &[RuleType]) -> Result<Vec<NotificationRule>>;

    fn known_values(&self, app_id: &str, value_type: ValueType) -> Result<Vec<KnownValue>>;

    /// Inserts values that are not yet known; existing rows are left
    /// untouched. Returns how many rows were actually inserted.
    fn insert_known_values(
        &self,
        app_id: &str,
        value_type: ValueType,
        values: &[String],
        first_seen_at: DateTime<Utc>,
    ) -> Result<usize>;

    /// True when a log row with exactly `dedup_key` was sent after `since`.
    fn has_notification_since(&self, dedup_key: &str, since: DateTime<Utc>) -> Result<bool>;

    /// Number of log rows for `app_id` sent after `since`.
    fn count_notifications_since(&self, app_id: &str, since: DateTime<Utc>) -> Result<u64>;

    fn append_log(&self, entry: &NotificationLogEntry) -> Result<()>;

    fn recent_logs(&self, app_id: &str, limit: usize) -> Result<Vec<NotificationLogView>>;
}
