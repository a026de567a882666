/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use beacon_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "notification_rule",
///     id: "rule-99".to_string(),
/// };
/// assert!(err.to_string().contains("notification_rule"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// A rule was linked to a channel that does not belong to the rule's app.
    #[error("Storage: channel {channel_id} does not belong to app {app_id}")]
    ChannelNotInApp { app_id: String, channel_id: String },

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A column held a value that does not map onto the domain type.
    #[error("Storage: invalid value in column '{column}': {value}")]
    InvalidColumn { column: &'static str, value: String },

    /// Filesystem error while preparing the database location.
    #[error("Storage: IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
