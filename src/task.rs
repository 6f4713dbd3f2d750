// src/task.rs
use crate::error::ScanError;

/// One unit of scan work over the half-open range `[start_index, end_index)`
#[derive(Debug)]
pub struct Task {
    pub log_uri: String,
    pub precerts_only: bool,
    /// Entries requested per get-entries round-trip
    pub batch_size: u64,
    /// Maximum batch fetches in flight
    pub concurrency: usize,
    pub start_index: u64,
    pub end_index: u64,
    /// Set once the fetch pipeline has run this task
    pub result: Option<TaskResult>,
}

impl Task {
    /// Number of indices covered by this task
    pub fn len(&self) -> u64 {
        self.end_index.saturating_sub(self.start_index)
    }

    pub fn is_empty(&self) -> bool {
        self.start_index >= self.end_index
    }

    /// Number of batches the pipeline will issue for this task
    pub fn batch_count(&self) -> u64 {
        self.len().div_ceil(self.batch_size.max(1))
    }

    pub fn succeeded(&self) -> bool {
        self.result.as_ref().is_some_and(|r| r.success)
    }

    /// Narrow the end of the task, never widening it or crossing the start
    pub fn clamp_end(&mut self, bound: u64) {
        self.end_index = self.end_index.min(bound).max(self.start_index);
    }
}

/// Outcome of running a task through the fetch pipeline
#[derive(Debug)]
pub struct TaskResult {
    pub success: bool,
    pub error: Option<ScanError>,
    pub stats: ScanStats,
}

impl TaskResult {
    pub fn ok(stats: ScanStats) -> Self {
        Self {
            success: true,
            error: None,
            stats,
        }
    }

    pub fn failed(error: ScanError, stats: ScanStats) -> Self {
        Self {
            success: false,
            error: Some(error),
            stats,
        }
    }
}

/// Per-task delivery accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub certs: u64,
    pub precerts: u64,
    /// Leaves with an entry type that is neither x509 nor precert
    pub unknown: u64,
    /// Leaves whose MerkleTreeLeaf structure could not be decoded
    pub unparsable: u64,
    /// Certificates filtered out by `precerts_only`
    pub skipped: u64,
}

impl ScanStats {
    pub fn total(&self) -> u64 {
        self.certs + self.precerts + self.unknown + self.unparsable + self.skipped
    }

    pub fn merge(&mut self, other: &ScanStats) {
        self.certs += other.certs;
        self.precerts += other.precerts;
        self.unknown += other.unknown;
        self.unparsable += other.unparsable;
        self.skipped += other.skipped;
    }
}
