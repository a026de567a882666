//! Management operations for the CRUD layer in front of the pipeline.
//!
//! These are thin pass-throughs into storage plus the dispatcher's test-send
//! path. Every operation is scoped to an app id; a channel or rule owned by
//! another app is reported as not found.

use crate::state::AppState;
use beacon_common::{ChannelType, NotificationChannel, NotificationLogView, NotificationRule, RuleType, ValueType};
use beacon_notify::{Dispatcher, NotifyError};
use beacon_query::{QueryEngine, QueryError};
use beacon_storage::{ChannelUpdate, NewChannel, NewRule, NotificationStore, RuleUpdate, StorageError};
use chrono::{Duration, Utc};
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_LOG_LIMIT: usize = 50;
pub const EVENT_NAME_LOOKBACK_DAYS: i64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ManagementError {
    #[error("Unknown channel type: {0}")]
    UnknownChannelType(String),

    #[error("Unknown rule type: {0}")]
    UnknownRuleType(String),

    #[error("{entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

pub type Result<T> = std::result::Result<T, ManagementError>;

/// Partial channel update. `None` keeps the stored value, and so does an
/// empty config object.
#[derive(Debug, Clone, Default)]
pub struct ChannelPatch {
    pub name: Option<String>,
    pub config: Option<Value>,
    pub enabled: Option<bool>,
}

/// Partial rule update. `channel_ids`, when present, replaces the whole set.
#[derive(Debug, Clone, Default)]
pub struct RulePatch {
    pub config: Option<Value>,
    pub enabled: Option<bool>,
    pub channel_ids: Option<Vec<String>>,
}

fn is_empty_config(config: &Value) -> bool {
    match config {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    query: Arc<dyn QueryEngine>,
    dispatcher: Arc<Dispatcher>,
}

impl NotificationService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            query: state.query.clone(),
            dispatcher: state.dispatcher.clone(),
        }
    }

    pub fn list_channels(&self, app_id: &str) -> Result<Vec<NotificationChannel>> {
        Ok(self.store.list_channels(app_id)?)
    }

    /// The channel type is fixed at creation and must name a known provider.
    pub fn create_channel(
        &self,
        app_id: &str,
        name: &str,
        channel_type: &str,
        config: &Value,
    ) -> Result<NotificationChannel> {
        let channel_type: ChannelType = channel_type
            .parse()
            .map_err(|_| ManagementError::UnknownChannelType(channel_type.to_string()))?;
        let channel = self.store.insert_channel(&NewChannel {
            app_id: app_id.to_string(),
            name: name.to_string(),
            channel_type: channel_type.as_str().to_string(),
            config_json: config.to_string(),
        })?;
        tracing::info!(app_id, channel_id = %channel.id, channel_type = %channel_type, "Channel created");
        Ok(channel)
    }

    pub fn update_channel(
        &self,
        app_id: &str,
        channel_id: &str,
        patch: ChannelPatch,
    ) -> Result<NotificationChannel> {
        let existing = self.channel(app_id, channel_id)?;
        let config_json = match patch.config {
            Some(config) if !is_empty_config(&config) => config.to_string(),
            _ => existing.config_json,
        };
        self.store.update_channel(
            channel_id,
            &ChannelUpdate {
                name: patch.name.unwrap_or(existing.name),
                config_json,
                enabled: patch.enabled.unwrap_or(existing.enabled),
            },
        )?;
        self.channel(app_id, channel_id)
    }

    /// Also removes the channel from every rule that referenced it.
    pub fn delete_channel(&self, app_id: &str, channel_id: &str) -> Result<()> {
        self.channel(app_id, channel_id)?;
        self.store.delete_channel(channel_id)?;
        tracing::info!(app_id, channel_id, "Channel deleted");
        Ok(())
    }

    pub fn list_rules(&self, app_id: &str) -> Result<Vec<NotificationRule>> {
        Ok(self.store.list_rules(app_id)?)
    }

    pub fn create_rule(
        &self,
        app_id: &str,
        rule_type: &str,
        config: &Value,
        channel_ids: Vec<String>,
    ) -> Result<NotificationRule> {
        let rule_type: RuleType = rule_type
            .parse()
            .map_err(|_| ManagementError::UnknownRuleType(rule_type.to_string()))?;
        let rule = self.store.insert_rule(&NewRule {
            app_id: app_id.to_string(),
            rule_type,
            config_json: config.to_string(),
            channel_ids,
        })?;
        tracing::info!(app_id, rule_id = %rule.id, rule_type = %rule_type, "Rule created");
        Ok(rule)
    }

    pub fn update_rule(&self, app_id: &str, rule_id: &str, patch: RulePatch) -> Result<NotificationRule> {
        let existing = self.rule(app_id, rule_id)?;
        self.store.update_rule(
            rule_id,
            &RuleUpdate {
                config_json: patch
                    .config
                    .map(|c| c.to_string())
                    .unwrap_or(existing.config_json),
                enabled: patch.enabled.unwrap_or(existing.enabled),
                channel_ids: patch.channel_ids.unwrap_or(existing.channel_ids),
            },
        )?;
        self.rule(app_id, rule_id)
    }

    pub fn delete_rule(&self, app_id: &str, rule_id: &str) -> Result<()> {
        self.rule(app_id, rule_id)?;
        self.store.delete_rule(rule_id)?;
        tracing::info!(app_id, rule_id, "Rule deleted");
        Ok(())
    }

    /// Delivers the fixed test message to one channel. Unlike scheduled
    /// delivery, failures are returned to the caller.
    pub async fn send_test(&self, app_id: &str, channel_id: &str) -> Result<()> {
        self.dispatcher.send_test(app_id, channel_id, Utc::now()).await?;
        Ok(())
    }

    /// Newest first; `None` uses [`DEFAULT_LOG_LIMIT`].
    pub fn recent_log(&self, app_id: &str, limit: Option<usize>) -> Result<Vec<NotificationLogView>> {
        Ok(self
            .store
            .recent_logs(app_id, limit.unwrap_or(DEFAULT_LOG_LIMIT))?)
    }

    /// Event names the app reported over the last 30 days, sorted.
    pub async fn event_names(&self, app_id: &str) -> Result<Vec<String>> {
        let since = Utc::now() - Duration::days(EVENT_NAME_LOOKBACK_DAYS);
        let rows = self
            .query
            .distinct_values(&[app_id.to_string()], ValueType::EventName, since)
            .await?;
        let mut names: Vec<String> = rows
            .into_iter()
            .filter(|r| r.app_id == app_id)
            .map(|r| r.value)
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn channel(&self, app_id: &str, channel_id: &str) -> Result<NotificationChannel> {
        self.store
            .get_channel(app_id, channel_id)?
            .ok_or_else(|| ManagementError::NotFound {
                entity: "channel",
                id: channel_id.to_string(),
            })
    }

    fn rule(&self, app_id: &str, rule_id: &str) -> Result<NotificationRule> {
        self.store
            .get_rule(app_id, rule_id)?
            .ok_or_else(|| ManagementError::NotFound {
                entity: "rule",
                id: rule_id.to_string(),
            })
    }
}
