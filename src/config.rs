// src/config.rs

use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;

use crate::error::ScanError;

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    pub log_uri: String,
    #[serde(default = "default_save_data")]
    pub save_data: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_concurrency", deserialize_with = "deserialize_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub start: u64,
    /// Exclusive end bound; 0 follows the log's tree size
    #[serde(default)]
    pub end: u64,
    #[serde(default)]
    pub precerts_only: bool,
    #[serde(default = "default_batches_per_task")]
    pub batches_per_task: u64,
    #[serde(default)]
    pub follow: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_save_data() -> String { "ct-scanlog-checkpoint.json".to_string() }
fn default_batch_size() -> u64 { 256 }
fn default_concurrency() -> usize { 1 }
fn default_batches_per_task() -> u64 { 1 }
fn default_poll_interval() -> u64 { 10 }

/// Accepts `concurrency = 4` as well as `concurrency = "4"`
fn deserialize_concurrency<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => usize::try_from(n).map_err(serde::de::Error::custom),
        Raw::Text(s) => s
            .trim()
            .parse::<usize>()
            .map_err(|e| serde::de::Error::custom(format!("invalid concurrency '{}': {}", s, e))),
    }
}

impl ScanConfig {
    /// Fixed end bound, or None when the scan follows the tree size
    pub fn end_bound(&self) -> Option<u64> {
        if self.end == 0 { None } else { Some(self.end) }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_secs: u64,
    /// Attempts per request; 1 means no retry
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_timeout() -> u64 { 10 }
fn default_connect_timeout() -> u64 { 30 }
fn default_user_agent() -> String { "ct-scanlog/1.0".to_string() }
fn default_pool_max_idle() -> usize { 10 }
fn default_pool_idle_timeout() -> u64 { 90 }
fn default_max_attempts() -> u32 { 1 }

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: default_user_agent(),
            pool_max_idle_per_host: default_pool_max_idle(),
            pool_idle_timeout_secs: default_pool_idle_timeout(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_dump_dir")]
    pub dump_dir: String,
    #[serde(default = "default_dump_artifacts")]
    pub dump_artifacts: bool,
    /// Append entry summaries as JSON lines to this file
    #[serde(default)]
    pub summary_file: Option<String>,
}

fn default_dump_dir() -> String { ".".to_string() }
fn default_dump_artifacts() -> bool { true }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dump_dir: default_dump_dir(),
            dump_artifacts: default_dump_artifacts(),
            summary_file: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub scan: ScanConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ScanError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: Config = toml::from_str(contents)
            .map_err(|e| ScanError::Config(format!("cannot parse config: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the scheduler and pipeline cannot work with
    pub fn validate(&self) -> Result<(), ScanError> {
        let scan = &self.scan;

        let url = url::Url::parse(&scan.log_uri)
            .map_err(|e| ScanError::Config(format!("invalid log_uri '{}': {}", scan.log_uri, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ScanError::Config(format!(
                "log_uri must be http(s), got '{}'",
                url.scheme()
            )));
        }

        if scan.batch_size == 0 {
            return Err(ScanError::Config("batch_size must be greater than 0".to_string()));
        }
        if scan.concurrency == 0 {
            return Err(ScanError::Config("concurrency must be greater than 0".to_string()));
        }
        if scan.batches_per_task == 0 {
            return Err(ScanError::Config(
                "batches_per_task must be greater than 0".to_string(),
            ));
        }
        if let Some(end) = scan.end_bound() {
            if scan.start > end {
                return Err(ScanError::Config(format!(
                    "start ({}) is past end ({})",
                    scan.start, end
                )));
            }
        }
        if scan.follow && scan.poll_interval_secs == 0 {
            return Err(ScanError::Config(
                "poll_interval_secs must be greater than 0 when follow is set".to_string(),
            ));
        }
        if scan.save_data.trim().is_empty() {
            return Err(ScanError::Config("save_data must name a file".to_string()));
        }
        if self.http.max_attempts == 0 {
            return Err(ScanError::Config("http.max_attempts must be at least 1".to_string()));
        }

        Ok(())
    }
}
