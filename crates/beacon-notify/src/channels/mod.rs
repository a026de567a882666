//! Delivery adapters, one per provider.

pub mod ntfy;
pub mod pushover;
pub mod telegram;

use crate::error::{NotifyError, Result};
use beacon_common::format::{truncate_string, MAX_BODY_LENGTH};
use beacon_common::ChannelType;

pub use ntfy::NtfyChannel;
pub use pushover::PushoverChannel;
pub use telegram::TelegramChannel;

/// A configured delivery adapter. Each variant performs exactly one
/// outbound request per [`send`](ChannelAdapter::send) and never retries.
#[derive(Debug, Clone)]
pub enum ChannelAdapter {
    Telegram(TelegramChannel),
    Pushover(PushoverChannel),
    Ntfy(NtfyChannel),
}

impl ChannelAdapter {
    pub async fn send(&self, title: &str, message: &str) -> Result<()> {
        match self {
            Self::Telegram(channel) => channel.send(title, message).await,
            Self::Pushover(channel) => channel.send(title, message).await,
            Self::Ntfy(channel) => channel.send(title, message).await,
        }
    }

    pub fn channel_type(&self) -> ChannelType {
        match self {
            Self::Telegram(_) => ChannelType::Telegram,
            Self::Pushover(_) => ChannelType::Pushover,
            Self::Ntfy(_) => ChannelType::Ntfy,
        }
    }
}

/// Maps a non-success provider response onto [`NotifyError::ApiError`].
pub(crate) async fn check_response(service: &str, resp: reqwest::Response) -> Result<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = match resp.text().await {
        Ok(text) => truncate_string(&text, MAX_BODY_LENGTH),
        Err(e) => format!("[Failed to read response body: {e}]"),
    };
    Err(NotifyError::ApiError {
        service: service.to_string(),
        status: status.as_u16(),
        body,
    })
}
