use beacon_query::QueryError;
use beacon_storage::StorageError;

/// Errors raised while evaluating a single rule.
///
/// # Examples
///
/// ```rust
/// use beacon_alert::error::AlertError;
///
/// let err = AlertError::InvalidConfig {
///     rule_id: "rule-7".to_string(),
///     reason: "missing event_name".to_string(),
/// };
/// assert!(err.to_string().contains("rule-7"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// A required configuration field is missing and has no sensible default.
    #[error("Alert: invalid configuration for rule {rule_id}: {reason}")]
    InvalidConfig { rule_id: String, reason: String },

    /// The aggregate query engine failed; the rule is retried next tick.
    #[error("Alert: query failed: {0}")]
    Query(#[from] QueryError),

    /// Reading or recording known values failed.
    #[error("Alert: storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Convenience `Result` alias for rule evaluation.
pub type Result<T> = std::result::Result<T, AlertError>;
