use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    engine::cycle::{EngineParams, EngineSettings},
    engine::spike::SpikeThresholds,
    types::{BucketSize, Timeframe, Topic},
};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub spike: SpikeThresholds,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_article_fetch_limit() -> u64 {
    20
}

fn default_article_display_limit() -> usize {
    15
}

fn default_anomaly_fetch_limit() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_article_fetch_limit")]
    pub article_fetch_limit: u64,
    #[serde(default = "default_article_display_limit")]
    pub article_display_limit: usize,
    #[serde(default = "default_anomaly_fetch_limit")]
    pub anomaly_fetch_limit: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            article_fetch_limit: default_article_fetch_limit(),
            article_display_limit: default_article_display_limit(),
            anomaly_fetch_limit: default_anomaly_fetch_limit(),
        }
    }
}

fn default_refresh_interval_ms() -> u64 {
    30_000
}

fn default_bucket_size() -> BucketSize {
    BucketSize::FiveMinutes
}

fn default_timeframe() -> Timeframe {
    Timeframe::TwentyFourHours
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub topic: Option<Topic>,
    #[serde(default = "default_bucket_size")]
    pub bucket_size: BucketSize,
    #[serde(default = "default_timeframe")]
    pub timeframe: Timeframe,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_refresh_interval_ms(),
            topic: None,
            bucket_size: default_bucket_size(),
            timeframe: default_timeframe(),
        }
    }
}

fn default_logging_dir() -> PathBuf {
    PathBuf::from("./logs/pulsewatch")
}

fn default_logging_filter() -> String {
    "info".to_string()
}

fn default_logging_rotation() -> LoggingRotation {
    LoggingRotation::Daily
}

fn default_logging_retention_days() -> usize {
    14
}

fn default_enabled_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default = "default_logging_rotation")]
    pub rotation: LoggingRotation,
    #[serde(default = "default_logging_retention_days")]
    pub retention_days: usize,
    #[serde(default = "default_enabled_true")]
    pub stderr_warn_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logging_dir(),
            filter: default_logging_filter(),
            rotation: default_logging_rotation(),
            retention_days: default_logging_retention_days(),
            stderr_warn_enabled: true,
        }
    }
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config_value: Value = json5::from_str(&config_content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let config: Config = serde_json::from_value(config_value)
            .context("failed to deserialize pulsewatch config")?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.api.request_timeout_ms.max(1))
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            refresh_interval: Duration::from_millis(self.refresh.interval_ms.max(1)),
            params: EngineParams {
                topic: self.refresh.topic,
                bucket_size: self.refresh.bucket_size,
                timeframe: self.refresh.timeframe,
            },
            thresholds: self.spike,
            article_fetch_limit: self.api.article_fetch_limit,
            article_display_limit: self.api.article_display_limit,
            anomaly_fetch_limit: self.api.anomaly_fetch_limit,
        }
    }
}
