// src/error.rs
//! Fatal error classes for a scan run.
//!
//! Per-entry problems (unparsable certificates, failed artifact writes) never
//! show up here: they are logged and counted where they happen.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Scan configuration missing, unreadable or invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Checkpoint present but unreadable, corrupt, or for another log
    #[error("checkpoint error at {path}: {reason}")]
    Checkpoint { path: String, reason: String },

    /// Could not build a client for the log endpoint
    #[error("failed to build client for {log_uri}: {reason}")]
    Transport { log_uri: String, reason: String },

    /// A batch fetch failed; the whole task failed with it
    #[error("fetch of entries [{start}, {end}) failed: {source}")]
    Fetch {
        start: u64,
        end: u64,
        #[source]
        source: anyhow::Error,
    },

    /// Scheduler was asked to advance past a task that did not succeed
    #[error("task [{start}, {end}) has not completed successfully")]
    TaskNotCompleted { start: u64, end: u64 },
}

impl ScanError {
    /// Fetch range for errors that carry one
    pub fn range(&self) -> Option<(u64, u64)> {
        match self {
            ScanError::Fetch { start, end, .. } | ScanError::TaskNotCompleted { start, end } => {
                Some((*start, *end))
            }
            _ => None,
        }
    }
}
