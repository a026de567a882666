//! Typed access to the aggregate analytics query engine.
//!
//! The engine is consumed as a set of named, parameterized queries. Each
//! query maps onto one method of [`QueryEngine`] and returns strongly shaped
//! rows; the query language behind the names is not visible here.

pub mod error;
pub mod http;


use async_trait::async_trait;
use beacon_common::ValueType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub use error::{QueryError, Result};
pub use http::HttpQueryEngine;

/// Per-app, per-event counts since a timestamp.
pub const EVENT_COUNTS_QUERY: &str = "notification_event_counts__v1";
/// Distinct values of one event column since a timestamp.
pub const DISTINCT_VALUES_QUERY: &str = "notification_distinct_values__v1";
/// Most recent event timestamp per app.
pub const LAST_EVENT_QUERY: &str = "notification_last_event__v1";
/// Daily event totals per app since a timestamp.
pub const DAILY_VOLUME_QUERY: &str = "notification_daily_volume__v1";
/// Events, sessions and unique users for one app over a date range.
pub const DIGEST_QUERY: &str = "notification_digest__v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCountRow {
    pub app_id: String,
    pub event_name: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinctValueRow {
    pub app_id: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastEventRow {
    pub app_id: String,
    pub last_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyVolumeRow {
    pub app_id: String,
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestSummary {
    pub events: i64,
    pub sessions: i64,
    pub users: i64,
}

/// Aggregate questions the evaluators ask about raw events.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn event_counts(
        &self,
        app_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<EventCountRow>>;

    /// Distinct values of the column backing `value_type` seen since `since`.
    async fn distinct_values(
        &self,
        app_ids: &[String],
        value_type: ValueType,
        since: DateTime<Utc>,
    ) -> Result<Vec<DistinctValueRow>>;

    /// Apps that never recorded an event are absent from the result.
    async fn last_events(&self, app_ids: &[String]) -> Result<Vec<LastEventRow>>;

    async fn daily_volume(
        &self,
        app_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyVolumeRow>>;

    async fn digest(
        &self,
        app_id: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<DigestSummary>;
}
