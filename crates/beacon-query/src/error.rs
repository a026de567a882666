/// Errors returned by the aggregate query engine client.
///
/// # Examples
///
/// ```rust
/// use beacon_query::error::QueryError;
///
/// let err = QueryError::Status {
///     query: "notification_event_counts__v1".to_string(),
///     status: 503,
///     body: "unavailable".to_string(),
/// };
/// assert!(err.to_string().contains("503"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Transport failure talking to the query engine.
    #[error("Query: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The engine answered with a non-success status.
    #[error("Query: {query} returned status={status}, body={body}")]
    Status {
        query: String,
        status: u16,
        body: String,
    },

    /// The response body did not match the expected row shape.
    #[error("Query: failed to decode {query} response: {source}")]
    Decode {
        query: String,
        #[source]
        source: serde_json::Error,
    },

    /// A single-row query returned no rows.
    #[error("Query: {0} returned no rows")]
    Empty(String),
}

/// Convenience `Result` alias for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
