use crate::error::{QueryError, Result};
use crate::{
    DailyVolumeRow, DigestSummary, DistinctValueRow, EventCountRow, LastEventRow, QueryEngine,
    DAILY_VOLUME_QUERY, DIGEST_QUERY, DISTINCT_VALUES_QUERY, EVENT_COUNTS_QUERY, LAST_EVENT_QUERY,
};
use async_trait::async_trait;
use beacon_common::format::{truncate_string, MAX_BODY_LENGTH};
use beacon_common::ValueType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

/// Query engine client that runs named queries over HTTP.
///
/// Each call is a `POST {base_url}/v1/queries/{name}` whose JSON body holds
/// the query parameters; the response is a JSON array of rows.
pub struct HttpQueryEngine {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpQueryEngine {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub(crate) async fn named_query<T: DeserializeOwned>(&self, name: &str, params: Value) -> Result<Vec<T>> {
        let url = format!("{}/v1/queries/{}", self.base_url, name);
        let mut request = self.client.post(&url).json(&params);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(QueryError::Status {
                query: name.to_string(),
                status: status.as_u16(),
                body: truncate_string(&body, MAX_BODY_LENGTH),
            });
        }

        let rows: Vec<T> = serde_json::from_str(&body).map_err(|source| QueryError::Decode {
            query: name.to_string(),
            source,
        })?;
        tracing::debug!(query = name, rows = rows.len(), "Named query completed");
        Ok(rows)
    }
}

#[async_trait]
impl QueryEngine for HttpQueryEngine {
    async fn event_counts(
        &self,
        app_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<EventCountRow>> {
        self.named_query(
            EVENT_COUNTS_QUERY,
            json!({ "app_ids": app_ids, "since": since }),
        )
        .await
    }

    async fn distinct_values(
        &self,
        app_ids: &[String],
        value_type: ValueType,
        since: DateTime<Utc>,
    ) -> Result<Vec<DistinctValueRow>> {
        self.named_query(
            DISTINCT_VALUES_QUERY,
            json!({
                "app_ids": app_ids,
                "column_name": value_type.as_str(),
                "since": since,
            }),
        )
        .await
    }

    async fn last_events(&self, app_ids: &[String]) -> Result<Vec<LastEventRow>> {
        self.named_query(LAST_EVENT_QUERY, json!({ "app_ids": app_ids }))
            .await
    }

    async fn daily_volume(
        &self,
        app_ids: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyVolumeRow>> {
        self.named_query(
            DAILY_VOLUME_QUERY,
            json!({ "app_ids": app_ids, "since": since }),
        )
        .await
    }

    async fn digest(
        &self,
        app_id: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<DigestSummary> {
        let rows: Vec<DigestSummary> = self
            .named_query(
                DIGEST_QUERY,
                json!({ "app_id": app_id, "date_from": date_from, "date_to": date_to }),
            )
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| QueryError::Empty(DIGEST_QUERY.to_string()))
    }
}
