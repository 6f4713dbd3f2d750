// src/director.rs
//! Driver loop: scheduler hands out a task, the scanner runs it, the
//! scheduler persists the successor. One task is in flight at a time.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::ct_log::{CtLogClient, LogSource};
use crate::processor::Processor;
use crate::progress::ScanProgress;
use crate::scanner::Scanner;
use crate::scheduler::{FileScheduler, Scheduler};
use crate::stats::StatsCollector;
use crate::task::{ScanStats, Task};

/// Single place fatal errors are reported before they end a run
pub trait FailureLogger: Send + Sync {
    fn fatal(&self, error: &anyhow::Error);
}

/// Reports fatal errors through tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl FailureLogger for TracingLogger {
    fn fatal(&self, error: &anyhow::Error) {
        error!("Scan aborted: {:#}", error);
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Cursor when the run started
    pub first_index: u64,
    /// Cursor persisted when the run stopped
    pub next_index: u64,
    pub tasks: u64,
    pub stats: ScanStats,
}

pub struct Director {
    scheduler: Box<dyn Scheduler>,
    scanner: Scanner,
    source: Arc<dyn LogSource>,
    logger: Arc<dyn FailureLogger>,
    stats: StatsCollector,
    progress: ScanProgress,
    follow: bool,
    poll_interval: Duration,
    /// Last observed tree size
    tree_size: Option<u64>,
}

impl Director {
    pub fn new(
        scheduler: Box<dyn Scheduler>,
        source: Arc<dyn LogSource>,
        processor: Arc<dyn Processor>,
        logger: Arc<dyn FailureLogger>,
        stats: StatsCollector,
        progress: ScanProgress,
    ) -> Self {
        Self {
            scheduler,
            scanner: Scanner::new(source.clone(), processor),
            source,
            logger,
            stats,
            progress,
            follow: false,
            poll_interval: Duration::from_secs(10),
            tree_size: None,
        }
    }

    /// Keep polling the tree head once caught up instead of finishing
    pub fn with_follow(mut self, poll_interval: Duration) -> Self {
        self.follow = true;
        self.poll_interval = poll_interval;
        self
    }

    /// Wire up the HTTP client and checkpoint scheduler from configuration.
    /// Failures are reported through `logger` before being returned.
    pub async fn from_config(
        config: &Config,
        processor: Arc<dyn Processor>,
        logger: Arc<dyn FailureLogger>,
        stats: StatsCollector,
        progress: ScanProgress,
    ) -> Result<Self> {
        let built = async {
            let client = CtLogClient::new(&config.scan.log_uri, &config.http)?;
            let scheduler = FileScheduler::start(&config.scan).await?;
            Ok::<_, anyhow::Error>((client, scheduler))
        }
        .await;

        let (client, scheduler) = match built {
            Ok(parts) => parts,
            Err(e) => {
                logger.fatal(&e);
                return Err(e);
            }
        };

        let director = Self::new(
            Box::new(scheduler),
            Arc::new(client),
            processor,
            logger,
            stats,
            progress,
        );

        Ok(if config.scan.follow {
            director.with_follow(Duration::from_secs(config.scan.poll_interval_secs))
        } else {
            director
        })
    }

    /// Task the run resumes with
    pub fn start(&self) -> Result<Task> {
        let task = self.scheduler.initial_task();
        info!(
            "Starting {} at index {} (batch size {}, concurrency {})",
            task.log_uri, task.start_index, task.batch_size, task.concurrency
        );
        Ok(task)
    }

    /// Run until the end bound is reached or a fatal error occurs
    pub async fn run(&mut self) -> Result<RunSummary> {
        let outcome = self.drive().await;
        self.progress.finish();

        match outcome {
            Ok(summary) => {
                info!(
                    "Scan finished at index {} after {} tasks ({} entries delivered)",
                    summary.next_index,
                    summary.tasks,
                    summary.stats.certs + summary.stats.precerts
                );
                Ok(summary)
            }
            Err(e) => {
                self.logger.fatal(&e);
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<RunSummary> {
        let mut task = self.start()?;
        let end_bound = self.scheduler.end_bound();

        let mut summary = RunSummary {
            first_index: task.start_index,
            next_index: task.start_index,
            ..Default::default()
        };

        loop {
            if task.is_empty() && end_bound.is_some_and(|end| task.start_index >= end) {
                info!("Reached end bound {}", task.start_index);
                break;
            }

            let planned_end = task.end_index;
            let tree_size = self.tree_size_covering(planned_end).await?;
            task.clamp_end(tree_size);

            if task.is_empty() {
                if !self.follow {
                    if end_bound.is_some() {
                        warn!(
                            "Log has only {} entries, stopping before end bound",
                            tree_size
                        );
                    } else {
                        info!("Caught up with tree size {}", tree_size);
                    }
                    break;
                }

                debug!(
                    "Caught up at {}, polling again in {:?}",
                    task.start_index, self.poll_interval
                );
                self.progress
                    .set_message(format!("index {} (waiting for new entries)", task.start_index));
                tokio::time::sleep(self.poll_interval).await;
                task.end_index = planned_end;
                self.tree_size = None;
                continue;
            }

            self.progress.set_cursor(task.start_index, end_bound);

            let mut result = self.scanner.scan(&task).await;
            self.stats.record_task(&result.stats);
            summary.stats.merge(&result.stats);

            if !result.success {
                let cause = result
                    .error
                    .take()
                    .map(anyhow::Error::from)
                    .unwrap_or_else(|| anyhow::anyhow!("scan reported failure without an error"));
                return Err(cause.context(format!(
                    "Task [{}, {}) of {} failed",
                    task.start_index, task.end_index, task.log_uri
                )));
            }

            task.result = Some(result);
            task = self.scheduler.next(&task).await?;

            summary.tasks += 1;
            summary.next_index = task.start_index;
        }

        summary.next_index = self.scheduler.checkpoint().start;
        Ok(summary)
    }

    /// Tree size, re-reading the tree head only when `end` is past what was
    /// last observed
    async fn tree_size_covering(&mut self, end: u64) -> Result<u64> {
        if let Some(size) = self.tree_size {
            if size >= end {
                return Ok(size);
            }
        }

        let size = self
            .source
            .tree_size()
            .await
            .context("Failed to read tree size")?;
        debug!("Tree size is {}", size);
        self.tree_size = Some(size);
        Ok(size)
    }
}
