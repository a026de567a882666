use anyhow::Context;
use beacon_notify::{DispatchPolicy, ProviderSettings};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub query_engine: QueryEngineConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub schedulers: SchedulersConfig,
    #[serde(default)]
    pub digest: DigestConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            query_engine: QueryEngineConfig::default(),
            providers: ProvidersConfig::default(),
            dispatch: DispatchConfig::default(),
            schedulers: SchedulersConfig::default(),
            digest: DigestConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{path}'"))?;
        Ok(config)
    }
}

fn default_database_path() -> String {
    "data/beacon.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEngineConfig {
    #[serde(default = "default_query_base_url")]
    pub base_url: String,
    #[serde(default = "default_query_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for QueryEngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_query_base_url(),
            timeout_secs: default_query_timeout_secs(),
            api_key: None,
        }
    }
}

fn default_query_base_url() -> String {
    "http://127.0.0.1:8123".to_string()
}

fn default_query_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_telegram_api_base")]
    pub telegram_api_base: String,
    #[serde(default = "default_pushover_api_base")]
    pub pushover_api_base: String,
    #[serde(default = "default_ntfy_server")]
    pub ntfy_default_server: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            telegram_api_base: default_telegram_api_base(),
            pushover_api_base: default_pushover_api_base(),
            ntfy_default_server: default_ntfy_server(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

impl ProvidersConfig {
    pub fn settings(&self) -> ProviderSettings {
        ProviderSettings {
            telegram_api_base: self.telegram_api_base.clone(),
            pushover_api_base: self.pushover_api_base.clone(),
            ntfy_default_server: self.ntfy_default_server.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_pushover_api_base() -> String {
    "https://api.pushover.net".to_string()
}

fn default_ntfy_server() -> String {
    "https://ntfy.sh".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Per-app ceiling on delivered notifications within the window.
    #[serde(default = "default_max_notifications_per_hour")]
    pub max_notifications_per_hour: u64,
    #[serde(default = "default_rate_limit_window_minutes")]
    pub rate_limit_window_minutes: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_notifications_per_hour: default_max_notifications_per_hour(),
            rate_limit_window_minutes: default_rate_limit_window_minutes(),
        }
    }
}

impl DispatchConfig {
    pub fn policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            max_notifications: self.max_notifications_per_hour,
            window: chrono::Duration::minutes(self.rate_limit_window_minutes),
        }
    }
}

fn default_max_notifications_per_hour() -> u64 {
    200
}

fn default_rate_limit_window_minutes() -> i64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_schedule_enabled")]
    pub enabled: bool,
    /// Six-field cron expression (seconds first), evaluated in UTC.
    pub cron: String,
}

fn default_schedule_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulersConfig {
    #[serde(default = "default_events_schedule")]
    pub events: ScheduleConfig,
    #[serde(default = "default_health_schedule")]
    pub health: ScheduleConfig,
    #[serde(default = "default_digest_schedule")]
    pub digest: ScheduleConfig,
}

impl Default for SchedulersConfig {
    fn default() -> Self {
        Self {
            events: default_events_schedule(),
            health: default_health_schedule(),
            digest: default_digest_schedule(),
        }
    }
}

fn default_events_schedule() -> ScheduleConfig {
    ScheduleConfig {
        enabled: true,
        cron: "0 */5 * * * *".to_string(),
    }
}

fn default_health_schedule() -> ScheduleConfig {
    ScheduleConfig {
        enabled: true,
        cron: "0 15,45 * * * *".to_string(),
    }
}

fn default_digest_schedule() -> ScheduleConfig {
    ScheduleConfig {
        enabled: true,
        cron: "0 0 8 * * *".to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Day weekly digests go out unless a rule names its own.
    #[serde(default = "default_weekly_day")]
    pub weekly_day: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            weekly_day: default_weekly_day(),
        }
    }
}

impl DigestConfig {
    pub fn weekly_day(&self) -> anyhow::Result<Weekday> {
        self.weekly_day
            .trim()
            .parse::<Weekday>()
            .map_err(|_| anyhow::anyhow!("Invalid digest.weekly_day '{}'", self.weekly_day))
    }
}

fn default_weekly_day() -> String {
    "monday".to_string()
}
