#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::Router;
use beacon_common::ValueType;
use beacon_notify::{ChannelResolver, DispatchPolicy, ProviderSettings};
use beacon_query::{
    DailyVolumeRow, DigestSummary, DistinctValueRow, EventCountRow, LastEventRow, QueryEngine,
    QueryError,
};
use beacon_server::state::AppState;
use beacon_storage::{NotificationStore, SqliteNotificationStore};
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Canned query engine. Apps listed in `failing_apps` get an error back.
#[derive(Default)]
pub struct FakeQuery {
    pub event_counts: Mutex<Vec<EventCountRow>>,
    pub distinct_values: Mutex<Vec<DistinctValueRow>>,
    pub last_events: Mutex<Vec<LastEventRow>>,
    pub daily_volume: Mutex<Vec<DailyVolumeRow>>,
    pub digest: Mutex<DigestSummary>,
    pub failing_apps: Mutex<HashSet<String>>,
    calls: AtomicUsize,
    digest_calls: AtomicUsize,
}

impl FakeQuery {
    fn record(&self, app_ids: &[String]) -> Result<(), QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_apps.lock().unwrap();
        if app_ids.iter().any(|a| failing.contains(a)) {
            return Err(QueryError::Empty("unavailable".to_string()));
        }
        Ok(())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn digest_calls(&self) -> usize {
        self.digest_calls.load(Ordering::SeqCst)
    }

    pub fn fail_for(&self, app_id: &str) {
        self.failing_apps.lock().unwrap().insert(app_id.to_string());
    }
}

#[async_trait]
impl QueryEngine for FakeQuery {
    async fn event_counts(
        &self,
        app_ids: &[String],
        _since: DateTime<Utc>,
    ) -> beacon_query::Result<Vec<EventCountRow>> {
        self.record(app_ids)?;
        Ok(self.event_counts.lock().unwrap().clone())
    }

    async fn distinct_values(
        &self,
        app_ids: &[String],
        _value_type: ValueType,
        _since: DateTime<Utc>,
    ) -> beacon_query::Result<Vec<DistinctValueRow>> {
        self.record(app_ids)?;
        Ok(self.distinct_values.lock().unwrap().clone())
    }

    async fn last_events(&self, app_ids: &[String]) -> beacon_query::Result<Vec<LastEventRow>> {
        self.record(app_ids)?;
        Ok(self.last_events.lock().unwrap().clone())
    }

    async fn daily_volume(
        &self,
        app_ids: &[String],
        _since: DateTime<Utc>,
    ) -> beacon_query::Result<Vec<DailyVolumeRow>> {
        self.record(app_ids)?;
        Ok(self.daily_volume.lock().unwrap().clone())
    }

    async fn digest(
        &self,
        app_id: &str,
        _date_from: NaiveDate,
        _date_to: NaiveDate,
    ) -> beacon_query::Result<DigestSummary> {
        self.digest_calls.fetch_add(1, Ordering::SeqCst);
        self.record(&[app_id.to_string()])?;
        Ok(*self.digest.lock().unwrap())
    }
}

/// Request paths seen by the provider stand-in. Paths containing `fail`
/// are answered with 500.
#[derive(Clone, Default)]
pub struct FakeProvider {
    paths: Arc<Mutex<Vec<String>>>,
}

impl FakeProvider {
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

async fn capture(State(provider): State<FakeProvider>, req: Request) -> StatusCode {
    let (parts, body) = req.into_parts();
    let _ = to_bytes(body, usize::MAX).await;
    let path = parts.uri.path().to_string();
    provider.paths.lock().unwrap().push(path.clone());
    if path.contains("fail") {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn spawn_provider() -> Result<(String, FakeProvider)> {
    let provider = FakeProvider::default();
    let app = Router::new()
        .fallback(capture)
        .with_state(provider.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), provider))
}

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub query: Arc<FakeQuery>,
    pub provider: FakeProvider,
}

impl TestContext {
    pub fn log_count(&self, app_id: &str) -> usize {
        self.state.store.recent_logs(app_id, 1000).unwrap().len()
    }
}

/// Builds an [`AppState`] over a fresh SQLite store, the given query engine
/// and a provider stand-in.
pub async fn build_state(query: Arc<dyn QueryEngine>) -> Result<(TempDir, AppState, FakeProvider)> {
    beacon_common::id::init(1, 1);

    let temp_dir = tempfile::tempdir()?;
    let store: Arc<dyn NotificationStore> =
        Arc::new(SqliteNotificationStore::open(&temp_dir.path().join("beacon.db"))?);
    let (base_url, provider) = spawn_provider().await?;
    let resolver = ChannelResolver::new(ProviderSettings {
        telegram_api_base: base_url.clone(),
        pushover_api_base: base_url.clone(),
        ntfy_default_server: base_url,
        timeout: std::time::Duration::from_secs(5),
    })?;

    let state = AppState::with_components(
        store,
        query,
        resolver,
        DispatchPolicy::default(),
        Weekday::Mon,
    );
    Ok((temp_dir, state, provider))
}

pub async fn build_test_context() -> Result<TestContext> {
    let query = Arc::new(FakeQuery::default());
    let (temp_dir, state, provider) = build_state(query.clone()).await?;

    Ok(TestContext {
        temp_dir,
        state,
        query,
        provider,
    })
}
