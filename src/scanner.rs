// src/scanner.rs
//! Batch-parallel fetch pipeline.
//!
//! A task's range is cut into contiguous batches of `batch_size` indices and
//! up to `concurrency` batches are fetched at once. Each batch delivers its
//! entries in ascending index order; batches finish in any order. The first
//! failing batch fails the whole task and the remaining in-flight fetches are
//! dropped.

use futures_util::stream::{self, TryStreamExt};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::ct_log::{EntryType, LogEntry, LogSource, RawLogEntry};
use crate::error::ScanError;
use crate::processor::Processor;
use crate::task::{ScanStats, Task, TaskResult};

/// Contiguous `[start, end)` sub-ranges of width `width` covering `[start, end)`
pub fn batch_ranges(start: u64, end: u64, width: u64) -> impl Iterator<Item = (u64, u64)> {
    let width = width.max(1);
    std::iter::successors(Some(start), move |&s| Some(s.saturating_add(width)))
        .take_while(move |&s| s < end)
        .map(move |s| (s, s.saturating_add(width).min(end)))
}

/// Runs tasks against a log, handing entries to a processor
pub struct Scanner {
    source: Arc<dyn LogSource>,
    processor: Arc<dyn Processor>,
}

impl Scanner {
    pub fn new(source: Arc<dyn LogSource>, processor: Arc<dyn Processor>) -> Self {
        Self { source, processor }
    }

    /// Scan `[task.start_index, task.end_index)`; never panics on fetch errors
    pub async fn scan(&self, task: &Task) -> TaskResult {
        if task.is_empty() {
            debug!(
                "Empty task at index {}, nothing to fetch",
                task.start_index
            );
            return TaskResult::ok(ScanStats::default());
        }

        debug!(
            "Scanning [{}, {}) of {} in {} batches of {} (concurrency {})",
            task.start_index,
            task.end_index,
            task.log_uri,
            task.batch_count(),
            task.batch_size,
            task.concurrency
        );

        let totals = Mutex::new(ScanStats::default());
        let batches = batch_ranges(task.start_index, task.end_index, task.batch_size);

        let outcome = stream::iter(batches.map(Ok::<_, ScanError>))
            .try_for_each_concurrent(task.concurrency.max(1), |(start, end)| {
                let totals = &totals;
                async move { self.scan_batch(task, start, end, totals).await }
            })
            .await;

        let stats = totals
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match outcome {
            Ok(()) => {
                info!(
                    "Scanned [{}, {}): {} certs, {} precerts, {} unknown, {} unparsable, {} skipped",
                    task.start_index,
                    task.end_index,
                    stats.certs,
                    stats.precerts,
                    stats.unknown,
                    stats.unparsable,
                    stats.skipped
                );
                TaskResult::ok(stats)
            }
            Err(e) => {
                warn!("Task [{}, {}) failed: {}", task.start_index, task.end_index, e);
                TaskResult::failed(e, stats)
            }
        }
    }

    /// Fetch and deliver one batch, re-requesting the tail after short reads.
    /// Accounting is folded into `totals` after every response.
    async fn scan_batch(
        &self,
        task: &Task,
        start: u64,
        end: u64,
        totals: &Mutex<ScanStats>,
    ) -> Result<(), ScanError> {
        let mut next = start;

        while next < end {
            let entries = self
                .source
                .get_entries(next, end - 1)
                .await
                .map_err(|source| ScanError::Fetch { start, end, source })?;

            if entries.is_empty() {
                return Err(ScanError::Fetch {
                    start,
                    end,
                    source: anyhow::anyhow!("log returned no entries for [{}, {}]", next, end - 1),
                });
            }

            let wanted = (end - next) as usize;
            if entries.len() < wanted {
                debug!(
                    "Short read at {}: got {} of {} entries",
                    next,
                    entries.len(),
                    wanted
                );
            }

            let delivered = entries.len().min(wanted);
            let mut chunk = ScanStats::default();
            for (offset, raw) in entries.iter().take(delivered).enumerate() {
                self.deliver(task, next + offset as u64, raw, &mut chunk).await;
            }
            totals
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .merge(&chunk);
            next += delivered as u64;
        }

        debug!("Batch [{}, {}) complete", start, end);
        Ok(())
    }

    async fn deliver(&self, task: &Task, index: u64, raw: &LogEntry, stats: &mut ScanStats) {
        let entry = match RawLogEntry::from_log_entry(index, raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Unparsable leaf at index {}: {:#}", index, e);
                stats.unparsable += 1;
                return;
            }
        };

        match entry.entry_type {
            EntryType::Certificate if task.precerts_only => stats.skipped += 1,
            EntryType::Certificate => {
                self.processor.process_cert(&entry).await;
                stats.certs += 1;
            }
            EntryType::Precertificate => {
                self.processor.process_precert(&entry).await;
                stats.precerts += 1;
            }
            EntryType::Unknown(code) => {
                warn!("Unknown log entry type {} at index {}", code, index);
                stats.unknown += 1;
            }
        }
    }
}
