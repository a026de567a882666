use crate::error::{NotifyError, Result};
use crate::resolver::ChannelResolver;
use beacon_common::{Firing, NotificationLogEntry, NotificationRule};
use beacon_storage::NotificationStore;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const TEST_TITLE: &str = "Beacon Test";
pub const TEST_MESSAGE: &str =
    "This is a test notification from Beacon. If you see this, your channel is configured correctly!";
/// Message recorded in the log for test sends.
const TEST_LOG_MESSAGE: &str = "Test notification";

/// Per-app delivery ceiling over a trailing window.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    pub max_notifications: u64,
    pub window: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_notifications: 200,
            window: Duration::minutes(60),
        }
    }
}

/// What happened to one firing. Returned for observability only; callers
/// are never expected to act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A log row with the same dedup key exists inside the window.
    Duplicate,
    /// The app reached its delivery ceiling.
    RateLimited { recent: u64 },
    /// The dedup or rate-limit lookup failed, nothing was sent.
    CheckFailed,
    /// Every channel was visited. `skipped` counts missing or disabled channels.
    Attempted {
        delivered: usize,
        failed: usize,
        skipped: usize,
    },
}

/// Applies dedup and rate limiting, then delivers a firing to each channel
/// of its rule and appends one log row per successful delivery.
///
/// Both checks read the log before anything is written, so concurrent
/// firings for the same app or dedup key may each pass and deliver. The
/// next firing after the log rows land is suppressed as usual.
pub struct Dispatcher {
    store: Arc<dyn NotificationStore>,
    resolver: ChannelResolver,
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        resolver: ChannelResolver,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            store,
            resolver,
            policy,
        }
    }

    /// Never fails. Errors are logged and the firing is treated as not
    /// delivered, to be retried by the next natural tick.
    pub async fn dispatch(
        &self,
        rule: &NotificationRule,
        firing: &Firing,
        now: DateTime<Utc>,
    ) -> DispatchOutcome {
        if let Some(key) = &firing.dedup_key {
            let since = now - Duration::minutes(i64::from(firing.dedup_window_minutes));
            match self.store.has_notification_since(key, since) {
                Ok(true) => {
                    tracing::debug!(
                        rule_id = %rule.id,
                        dedup_key = %key,
                        "Skipping notification due to dedup key"
                    );
                    return DispatchOutcome::Duplicate;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(rule_id = %rule.id, error = %e, "Dedup lookup failed");
                    return DispatchOutcome::CheckFailed;
                }
            }
        }

        let recent = match self
            .store
            .count_notifications_since(&rule.app_id, now - self.policy.window)
        {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(rule_id = %rule.id, error = %e, "Rate limit lookup failed");
                return DispatchOutcome::CheckFailed;
            }
        };
        if recent >= self.policy.max_notifications {
            tracing::warn!(
                app_id = %rule.app_id,
                recent,
                limit = self.policy.max_notifications,
                "Rate limit reached, skipping notification"
            );
            return DispatchOutcome::RateLimited { recent };
        }

        let mut delivered = 0;
        let mut failed = 0;
        let mut skipped = 0;
        for channel_id in &rule.channel_ids {
            match self.deliver(rule, channel_id, firing, now).await {
                Ok(true) => {
                    delivered += 1;
                    tracing::info!(
                        rule_id = %rule.id,
                        channel_id = %channel_id,
                        "Notification sent"
                    );
                }
                Ok(false) => skipped += 1,
                Err(e) => {
                    failed += 1;
                    tracing::error!(
                        rule_id = %rule.id,
                        channel_id = %channel_id,
                        error = %e,
                        "Failed to send notification"
                    );
                }
            }
        }

        DispatchOutcome::Attempted {
            delivered,
            failed,
            skipped,
        }
    }

    /// Returns `Ok(false)` when the channel is missing or disabled.
    async fn deliver(
        &self,
        rule: &NotificationRule,
        channel_id: &str,
        firing: &Firing,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(channel) = self.store.get_channel(&rule.app_id, channel_id)? else {
            return Ok(false);
        };
        if !channel.enabled {
            return Ok(false);
        }

        let adapter = self.resolver.resolve(&channel)?;
        adapter.send(&firing.title, &firing.message).await?;

        self.store.append_log(&NotificationLogEntry {
            id: beacon_common::id::next_id(),
            app_id: rule.app_id.clone(),
            rule_id: Some(rule.id.clone()),
            channel_id: channel.id,
            message: firing.message.clone(),
            sent_at: now,
            dedup_key: firing.dedup_key.clone(),
        })?;
        Ok(true)
    }

    /// Sends a fixed message to one channel, bypassing dedup and rate
    /// limiting. Unlike [`dispatch`](Self::dispatch), failures are returned.
    pub async fn send_test(&self, app_id: &str, channel_id: &str, now: DateTime<Utc>) -> Result<()> {
        let channel = self.store.get_channel(app_id, channel_id)?.ok_or_else(|| {
            NotifyError::ChannelNotFound {
                app_id: app_id.to_string(),
                channel_id: channel_id.to_string(),
            }
        })?;

        let adapter = self.resolver.resolve(&channel)?;
        adapter.send(TEST_TITLE, TEST_MESSAGE).await?;

        self.store.append_log(&NotificationLogEntry {
            id: beacon_common::id::next_id(),
            app_id: app_id.to_string(),
            rule_id: None,
            channel_id: channel.id,
            message: TEST_LOG_MESSAGE.to_string(),
            sent_at: now,
            dedup_key: None,
        })?;
        tracing::info!(app_id, channel_id, "Test notification sent");
        Ok(())
    }
}
