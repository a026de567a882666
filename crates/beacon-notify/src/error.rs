use beacon_storage::StorageError;

/// Errors that can occur while resolving or delivering through a channel.
///
/// # Examples
///
/// ```rust
/// use beacon_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing bot_token".to_string());
/// assert!(err.to_string().contains("bot_token"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required field or contains an invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// The stored channel type has no delivery adapter.
    #[error("Notify: unknown channel type '{0}'")]
    UnknownChannelType(String),

    /// The channel does not exist for the given app.
    #[error("Notify: channel {channel_id} not found for app {app_id}")]
    ChannelNotFound { app_id: String, channel_id: String },

    /// An HTTP request to an external notification endpoint failed.
    #[error("Notify: HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed (e.g. config_json parsing).
    #[error("Notify: JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The external API returned a non-success response.
    #[error("Notify: API error from {service}: status={status}, body={body}")]
    ApiError {
        service: String,
        status: u16,
        body: String,
    },

    /// Reading channels or writing the delivery log failed.
    #[error("Notify: storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
