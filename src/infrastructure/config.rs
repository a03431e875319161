use chrono::Duration;
use serde::Deserialize;

use crate::domain::series::RankingMetric;

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub store: StoreSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub host: String,
    pub token: String,
    pub database: String,
    pub retention_policy: String,
    pub measurement: String,
}

/// Per-category cache TTLs, in seconds. Rarely-changing data (production
/// weeks) defaults to a long TTL, per-line motor lists to a short one.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheTtls {
    #[serde(default = "default_zones_secs")]
    zones_secs: u64,
    #[serde(default = "default_lines_secs")]
    lines_secs: u64,
    #[serde(default = "default_motors_secs")]
    motors_secs: u64,
    #[serde(default = "default_weeks_secs")]
    weeks_secs: u64,
}

fn default_zones_secs() -> u64 {
    300
}

fn default_lines_secs() -> u64 {
    120
}

fn default_motors_secs() -> u64 {
    60
}

fn default_weeks_secs() -> u64 {
    3600
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            zones_secs: default_zones_secs(),
            lines_secs: default_lines_secs(),
            motors_secs: default_motors_secs(),
            weeks_secs: default_weeks_secs(),
        }
    }
}

impl CacheTtls {
    pub fn zones(&self) -> Duration {
        Duration::seconds(self.zones_secs as i64)
    }

    pub fn lines(&self) -> Duration {
        Duration::seconds(self.lines_secs as i64)
    }

    pub fn motors(&self) -> Duration {
        Duration::seconds(self.motors_secs as i64)
    }

    pub fn weeks(&self) -> Duration {
        Duration::seconds(self.weeks_secs as i64)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuerySettings {
    /// Nominal point budget for downsampled series.
    #[serde(default = "default_target_budget")]
    pub target_budget: usize,
    /// Trailing window for "latest" views; the source installations use
    /// 10 to 15 minutes.
    #[serde(default = "default_live_window_minutes")]
    pub live_window_minutes: i64,
    /// Field driving peak/valley selection.
    #[serde(default)]
    pub ranking_metric: RankingMetric,
}

fn default_target_budget() -> usize {
    150
}

fn default_live_window_minutes() -> i64 {
    10
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            target_budget: default_target_budget(),
            live_window_minutes: default_live_window_minutes(),
            ranking_metric: RankingMetric::default(),
        }
    }
}

impl QuerySettings {
    pub fn live_window(&self) -> Duration {
        Duration::minutes(self.live_window_minutes)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub cache: CacheTtls,
    #[serde(default)]
    pub query: QuerySettings,
}

pub fn load_store_config() -> anyhow::Result<StoreConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/store"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn load_service_config() -> anyhow::Result<ServiceConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/service"))
        .build()?;

    Ok(settings.try_deserialize()?)
}
