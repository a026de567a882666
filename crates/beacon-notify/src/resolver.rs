use crate::channels::{ChannelAdapter, NtfyChannel, PushoverChannel, TelegramChannel};
use crate::error::{NotifyError, Result};
use beacon_common::{ChannelType, NotificationChannel};
use serde_json::Value;
use std::time::Duration;

/// Provider endpoints and the outbound request timeout shared by every
/// adapter the resolver builds.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub telegram_api_base: String,
    pub pushover_api_base: String,
    pub ntfy_default_server: String,
    pub timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            telegram_api_base: "https://api.telegram.org".to_string(),
            pushover_api_base: "https://api.pushover.net".to_string(),
            ntfy_default_server: "https://ntfy.sh".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Builds a [`ChannelAdapter`] from a stored channel's type and
/// configuration. All adapters share one HTTP client.
#[derive(Debug, Clone)]
pub struct ChannelResolver {
    client: reqwest::Client,
    settings: ProviderSettings,
}

impl ChannelResolver {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    /// Fails with [`NotifyError::UnknownChannelType`] for types without an
    /// adapter and [`NotifyError::InvalidConfig`] when a required provider
    /// field is missing.
    pub fn resolve(&self, channel: &NotificationChannel) -> Result<ChannelAdapter> {
        let channel_type: ChannelType = channel
            .channel_type
            .parse()
            .map_err(|_| NotifyError::UnknownChannelType(channel.channel_type.clone()))?;
        let config: Value = serde_json::from_str(&channel.config_json)?;

        let adapter = match channel_type {
            ChannelType::Telegram => ChannelAdapter::Telegram(TelegramChannel::new(
                self.client.clone(),
                &self.settings.telegram_api_base,
                &required_field(&config, "bot_token")?,
                &required_field(&config, "chat_id")?,
            )),
            ChannelType::Pushover => ChannelAdapter::Pushover(PushoverChannel::new(
                self.client.clone(),
                &self.settings.pushover_api_base,
                &required_field(&config, "user_key")?,
                &required_field(&config, "app_token")?,
            )),
            ChannelType::Ntfy => {
                let server_url = optional_field(&config, "server_url")
                    .unwrap_or_else(|| self.settings.ntfy_default_server.clone());
                ChannelAdapter::Ntfy(NtfyChannel::new(
                    self.client.clone(),
                    &server_url,
                    &required_field(&config, "topic")?,
                    optional_field(&config, "token"),
                ))
            }
        };
        Ok(adapter)
    }
}

/// Reads a string field; numbers are accepted too since chat ids are often
/// stored unquoted.
fn optional_field(config: &Value, key: &str) -> Option<String> {
    match config.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_field(config: &Value, key: &str) -> Result<String> {
    optional_field(config, key)
        .ok_or_else(|| NotifyError::InvalidConfig(format!("missing {key}")))
}
