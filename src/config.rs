use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use anyhow::Result;
use crate::collect::{MetricType, METRIC_NAMES};
use crate::error::ProbeError;
use crate::prober::ProbeRequest;
use std::path::Path;
use tokio::fs;

pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;
pub const DEFAULT_COUNT: i64 = 5;

/// Per-collection ping settings, as handed over by the collector host.
///
/// `timeout` and `count` treat 0 the same as "not set".
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct PingConfig {
    #[serde(default)]
    pub hostname: Option<String>,
    /// Seconds.
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub count: Option<i64>,
}

#[cfg(test)]
impl PingConfig {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            ..Default::default()
        }
    }
}

impl PingConfig {
    /// Apply defaults and build a validated request.
    pub fn to_request(&self) -> Result<ProbeRequest, ProbeError> {
        let hostname = match self.hostname.as_deref() {
            Some(h) if !h.is_empty() => h,
            _ => return Err(ProbeError::config("hostname", "hostname missing from config")),
        };

        let timeout = match self.timeout {
            None => DEFAULT_TIMEOUT_SECS,
            Some(t) if t == 0.0 => DEFAULT_TIMEOUT_SECS,
            Some(t) if t > 0.0 => t,
            Some(t) => {
                return Err(ProbeError::config("timeout", format!("{t} is not greater than 0")));
            }
        };
        // Whole milliseconds, truncated.
        let timeout = Duration::from_millis((timeout * 1000.0) as u64);

        let count = match self.count {
            None | Some(0) => DEFAULT_COUNT,
            Some(c) => c,
        };
        if count < 0 {
            return Err(ProbeError::config("count", format!("{count} is not greater than 0")));
        }
        let count = u16::try_from(count)
            .map_err(|_| ProbeError::config("count", format!("{count} exceeds {}", u16::MAX)))?;

        ProbeRequest::new(hostname, count, timeout)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    pub ping: PingConfig,
    /// 0 runs a single collection and exits.
    #[serde(default)]
    pub probe_interval_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    /// Stat names to emit.
    #[serde(default = "default_metrics")]
    pub metrics: Vec<String>,
    #[serde(default = "default_metric_version")]
    pub metric_version: i32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9100
}

fn default_metrics() -> Vec<String> {
    METRIC_NAMES.iter().map(|s| s.to_string()).collect()
}

fn default_metric_version() -> i32 {
    1
}

impl AppConfig {
    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(anyhow::anyhow!("Invalid log level: {}. Valid levels are: trace, debug, info, warn, error", self.log_level))
        }
    }

    /// Metric types to request on every collection.
    pub fn requested_metrics(&self) -> Vec<MetricType> {
        self.metrics
            .iter()
            .map(|name| MetricType::new(name, self.metric_version))
            .collect()
    }
}

pub struct ConfigManager {
    pub config: Arc<RwLock<AppConfig>>,
}

impl ConfigManager {
    pub async fn start() -> Result<Self> {
        let config_file = std::env::var("PROBE_CONFIG")
            .unwrap_or_else(|_| "probe.json".to_string());

        // Load initial config from file
        let initial = Self::load_file_config(&config_file).await?;
        initial.get_tracing_level()?;
        let config = Arc::new(RwLock::new(initial));

        let poll_interval_sec: u64 = std::env::var("CONFIG_POLL_INTERVAL_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        // Spawn background task to watch file for changes
        {
            let config_clone = config.clone();
            let config_file_clone = config_file.clone();

            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(tokio::time::Duration::from_secs(poll_interval_sec)).await;
                    match Self::load_file_config(&config_file_clone).await {
                        Ok(new_cfg) => {
                            // check if changed
                            let mut c = config_clone.write().await;
                            if *c != new_cfg {
                                tracing::info!("Local config file updated");
                                *c = new_cfg;
                            }
                        }
                        Err(e) => {
                            tracing::error!("Error reading config file {}: {:?}", config_file_clone, e);
                        }
                    }
                }
            });
        }

        Ok(ConfigManager { config })
    }

    async fn load_file_config(file_path: &str) -> Result<AppConfig> {
        if !Path::new(file_path).exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", file_path));
        }

        let content = fs::read_to_string(file_path).await?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }
}
