// src/scheduler.rs
//! Durable scan cursor.
//!
//! The scheduler hands out one task at a time. When a task comes back
//! completed, the successor cursor is written to the checkpoint file before
//! the successor task is returned, so a crash at any point re-runs at most the
//! task that was in flight.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::task::Task;

/// Persisted scheduler state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(rename = "uri")]
    pub log_uri: String,
    /// Batches completed so far in this lineage
    #[serde(rename = "current")]
    pub current_batch: u64,
    #[serde(rename = "batchSize")]
    pub batch_size: u64,
    #[serde(rename = "saveData")]
    pub save_data: String,
    /// Next index to scan
    pub start: u64,
    /// Exclusive end bound; 0 follows the tree size
    pub end: u64,
}

impl Checkpoint {
    pub fn end_bound(&self) -> Option<u64> {
        if self.end == 0 { None } else { Some(self.end) }
    }

    /// Load a checkpoint, returning None when the file does not exist
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ScanError::Checkpoint {
                    path: path.display().to_string(),
                    reason: format!("unreadable: {}", e),
                }
                .into());
            }
        };

        let checkpoint: Checkpoint =
            serde_json::from_str(&contents).map_err(|e| ScanError::Checkpoint {
                path: path.display().to_string(),
                reason: format!("corrupt: {}", e),
            })?;

        Ok(Some(checkpoint))
    }

    /// Write to a temporary file first, then rename over the old checkpoint
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize checkpoint")?;

        let temp_path = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .with_context(|| format!("Failed to create checkpoint file {:?}", temp_path))?;
        file.write_all(json.as_bytes())
            .await
            .with_context(|| format!("Failed to write checkpoint to {:?}", temp_path))?;
        // Contents must be on disk before the rename makes them the checkpoint
        file.sync_all()
            .await
            .with_context(|| format!("Failed to sync checkpoint file {:?}", temp_path))?;
        drop(file);

        fs::rename(&temp_path, path)
            .await
            .with_context(|| format!("Failed to move checkpoint into place at {:?}", path))?;

        debug!("Checkpoint saved: start={} current={}", self.start, self.current_batch);

        Ok(())
    }
}

/// Decides the next unit of work and records progress
#[async_trait]
pub trait Scheduler: Send {
    /// Task the lineage resumes with
    fn initial_task(&self) -> Task;

    /// Successor of a successfully completed task, persisted before returning
    async fn next(&mut self, completed: &Task) -> Result<Task>;

    /// Fixed end bound, or None when following the tree size
    fn end_bound(&self) -> Option<u64>;

    fn checkpoint(&self) -> &Checkpoint;
}

/// Task shape settings that come from configuration, not the checkpoint
#[derive(Debug, Clone)]
struct TaskShape {
    precerts_only: bool,
    concurrency: usize,
    batches_per_task: u64,
}

/// Scheduler backed by a JSON checkpoint file
pub struct FileScheduler {
    state: Checkpoint,
    path: PathBuf,
    shape: TaskShape,
}

impl FileScheduler {
    /// Resume from the checkpoint named by `scan.save_data`, or start fresh
    pub async fn start(scan: &ScanConfig) -> Result<Self> {
        let path = PathBuf::from(&scan.save_data);
        let shape = TaskShape {
            precerts_only: scan.precerts_only,
            concurrency: scan.concurrency.max(1),
            batches_per_task: scan.batches_per_task.max(1),
        };

        let state = match Checkpoint::load(&path).await? {
            Some(saved) => {
                if saved.log_uri != scan.log_uri {
                    return Err(ScanError::Checkpoint {
                        path: path.display().to_string(),
                        reason: format!(
                            "belongs to {} but the configured log is {}",
                            saved.log_uri, scan.log_uri
                        ),
                    }
                    .into());
                }
                if saved.batch_size == 0 {
                    return Err(ScanError::Checkpoint {
                        path: path.display().to_string(),
                        reason: "batchSize is 0".to_string(),
                    }
                    .into());
                }
                if saved.batch_size != scan.batch_size {
                    warn!(
                        "Checkpoint batch size {} differs from configured {}; keeping checkpoint value",
                        saved.batch_size, scan.batch_size
                    );
                }

                info!(
                    "Resuming {} from checkpoint {:?}: start={}, batches done={}",
                    saved.log_uri, path, saved.start, saved.current_batch
                );
                saved
            }
            None => {
                info!(
                    "Checkpoint {:?} does not exist, starting fresh at index {}",
                    path, scan.start
                );
                Checkpoint {
                    log_uri: scan.log_uri.clone(),
                    current_batch: 0,
                    batch_size: scan.batch_size,
                    save_data: scan.save_data.clone(),
                    start: scan.start,
                    end: scan.end,
                }
            }
        };

        Ok(Self { state, path, shape })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn task_at(&self, start: u64) -> Task {
        let width = self
            .state
            .batch_size
            .saturating_mul(self.shape.batches_per_task);
        let mut end = start.saturating_add(width);
        if let Some(bound) = self.state.end_bound() {
            end = end.min(bound).max(start);
        }

        Task {
            log_uri: self.state.log_uri.clone(),
            precerts_only: self.shape.precerts_only,
            batch_size: self.state.batch_size,
            concurrency: self.shape.concurrency,
            start_index: start,
            end_index: end,
            result: None,
        }
    }
}

#[async_trait]
impl Scheduler for FileScheduler {
    fn initial_task(&self) -> Task {
        self.task_at(self.state.start)
    }

    async fn next(&mut self, completed: &Task) -> Result<Task> {
        if !completed.succeeded() {
            return Err(ScanError::TaskNotCompleted {
                start: completed.start_index,
                end: completed.end_index,
            }
            .into());
        }
        if completed.start_index != self.state.start {
            anyhow::bail!(
                "completed task starts at {} but the checkpoint cursor is at {}",
                completed.start_index,
                self.state.start
            );
        }

        // Advance by what was actually scanned, which may be less than the
        // task width when the director clamped it to the tree size
        let mut successor = self.state.clone();
        successor.start = completed.end_index.max(self.state.start);
        successor.current_batch += completed.batch_count();

        successor.save(&self.path).await.map_err(|e| ScanError::Checkpoint {
            path: self.path.display().to_string(),
            reason: format!("{:#}", e),
        })?;
        self.state = successor;

        Ok(self.task_at(self.state.start))
    }

    fn end_bound(&self) -> Option<u64> {
        self.state.end_bound()
    }

    fn checkpoint(&self) -> &Checkpoint {
        &self.state
    }
}
