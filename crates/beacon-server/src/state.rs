use crate::config::ServerConfig;
use anyhow::Context;
use beacon_alert::EvaluatorRegistry;
use beacon_notify::{ChannelResolver, Dispatcher};
use beacon_query::http::HttpQueryEngine;
use beacon_query::QueryEngine;
use beacon_storage::{KnownValueTracker, NotificationStore, SqliteNotificationStore};
use chrono::Weekday;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Components shared by the schedulers and the management service.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn NotificationStore>,
    pub query: Arc<dyn QueryEngine>,
    pub dispatcher: Arc<Dispatcher>,
    pub evaluators: Arc<EvaluatorRegistry>,
    pub default_weekly_day: Weekday,
}

impl AppState {
    pub fn build(config: &ServerConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn NotificationStore> = Arc::new(
            SqliteNotificationStore::open(Path::new(&config.database_path))
                .with_context(|| format!("Failed to open database '{}'", config.database_path))?,
        );
        let query: Arc<dyn QueryEngine> = Arc::new(
            HttpQueryEngine::new(
                &config.query_engine.base_url,
                config.query_engine.api_key.clone(),
                Duration::from_secs(config.query_engine.timeout_secs),
            )
            .context("Failed to build query engine client")?,
        );
        let resolver = ChannelResolver::new(config.providers.settings())
            .context("Failed to build provider HTTP client")?;
        Ok(Self::with_components(
            store,
            query,
            resolver,
            config.dispatch.policy(),
            config.digest.weekly_day()?,
        ))
    }

    /// Wires the evaluators and dispatcher around an existing store and
    /// query engine.
    pub fn with_components(
        store: Arc<dyn NotificationStore>,
        query: Arc<dyn QueryEngine>,
        resolver: ChannelResolver,
        policy: beacon_notify::DispatchPolicy,
        default_weekly_day: Weekday,
    ) -> Self {
        let tracker = KnownValueTracker::new(store.clone());
        let evaluators = Arc::new(EvaluatorRegistry::standard(
            query.clone(),
            tracker,
            default_weekly_day,
        ));
        let dispatcher = Arc::new(Dispatcher::new(store.clone(), resolver, policy));
        Self {
            store,
            query,
            dispatcher,
            evaluators,
            default_weekly_day,
        }
    }
}
