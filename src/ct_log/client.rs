// src/ct_log/client.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::{GetEntriesResponse, LogEntry, SignedTreeHead};
use crate::config::HttpConfig;
use crate::error::ScanError;

/// Read-only view of a CT log used by the fetch pipeline and the director
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Current number of leaves in the log
    async fn tree_size(&self) -> Result<u64>;

    /// Entries `start..=end`; logs may return fewer than requested
    async fn get_entries(&self, start: u64, end: u64) -> Result<Vec<LogEntry>>;
}

/// HTTP client for Certificate Transparency log RFC 6962 API
pub struct CtLogClient {
    base_url: String,
    http_client: reqwest::Client,
    max_attempts: u32,
}

impl CtLogClient {
    /// Create a new CT log client
    pub fn new(base_url: &str, http: &HttpConfig) -> Result<Self, ScanError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
            .pool_max_idle_per_host(http.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(http.pool_idle_timeout_secs))
            .user_agent(http.user_agent.clone())
            .gzip(true)
            .build()
            .map_err(|e| ScanError::Transport {
                log_uri: base_url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            max_attempts: http.max_attempts.max(1),
        })
    }

    /// Get Signed Tree Head (current log size and timestamp)
    /// Endpoint: GET {base_url}/ct/v1/get-sth
    pub async fn get_sth(&self) -> Result<SignedTreeHead> {
        let url = format!("{}/ct/v1/get-sth", self.base_url);

        debug!("Fetching STH from {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch STH")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "STH request failed with status {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            );
        }

        let sth: SignedTreeHead = response
            .json()
            .await
            .context("Failed to parse STH JSON")?;

        debug!(
            "STH received: tree_size={}, timestamp={}",
            sth.tree_size, sth.timestamp
        );

        Ok(sth)
    }

    /// Get entries from CT log
    /// Endpoint: GET {base_url}/ct/v1/get-entries?start={start}&end={end}
    pub async fn fetch_entries(&self, start: u64, end: u64) -> Result<Vec<LogEntry>> {
        let url = format!(
            "{}/ct/v1/get-entries?start={}&end={}",
            self.base_url, start, end
        );

        debug!("Fetching entries {}-{} from {}", start, end, self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch entries")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                warn!("Rate limited by CT log: {}", self.base_url);
                anyhow::bail!("Rate limited (429)");
            }

            anyhow::bail!(
                "Get entries request failed with status {}: {}",
                status,
                body
            );
        }

        let entries_response: GetEntriesResponse = response
            .json()
            .await
            .context("Failed to parse entries JSON")?;

        debug!(
            "Received {} entries from {}",
            entries_response.entries.len(),
            self.base_url
        );

        Ok(entries_response.entries)
    }

    /// Run `op` up to `max_attempts` times with exponential backoff
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = 0;
        let mut backoff = Duration::from_secs(1);

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempts += 1;

                    if attempts >= self.max_attempts {
                        if self.max_attempts > 1 {
                            return Err(e.context(format!(
                                "{} failed after {} attempts",
                                what, attempts
                            )));
                        }
                        return Err(e);
                    }

                    warn!(
                        "Error during {} (attempt {}/{}): {}. Retrying in {:?}",
                        what, attempts, self.max_attempts, e, backoff
                    );

                    tokio::time::sleep(backoff).await;

                    // Exponential backoff with max 60 seconds
                    backoff = std::cmp::min(backoff * 2, Duration::from_secs(60));
                }
            }
        }
    }
}

#[async_trait]
impl LogSource for CtLogClient {
    async fn tree_size(&self) -> Result<u64> {
        let sth = self.with_retry("get-sth", move || self.get_sth()).await?;
        Ok(sth.tree_size)
    }

    async fn get_entries(&self, start: u64, end: u64) -> Result<Vec<LogEntry>> {
        self.with_retry("get-entries", move || self.fetch_entries(start, end))
            .await
    }
}
