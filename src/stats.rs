// src/stats.rs
//! Statistics tracking for ct-scanlog

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::task::ScanStats;

/// Thread-safe statistics collector shared by the processor and the director
#[derive(Clone)]
pub struct StatsCollector {
    inner: Arc<Counters>,
    start_time: Instant,
}

#[derive(Default)]
struct Counters {
    certs: AtomicU64,
    precerts: AtomicU64,
    unknown: AtomicU64,
    unparsable: AtomicU64,
    skipped: AtomicU64,
    parse_failures: AtomicU64,
    artifacts_written: AtomicU64,
    artifacts_failed: AtomicU64,
    tasks_completed: AtomicU64,
}

/// Snapshot of statistics at a point in time
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub certs: u64,
    pub precerts: u64,
    pub unknown: u64,
    pub unparsable: u64,
    pub skipped: u64,
    pub parse_failures: u64,
    pub artifacts_written: u64,
    pub artifacts_failed: u64,
    pub tasks_completed: u64,
    pub entries_per_minute: f64,
    pub uptime_secs: u64,
}

impl StatsSnapshot {
    /// Entries delivered to the processor
    pub fn delivered(&self) -> u64 {
        self.certs + self.precerts
    }
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Counters::default()),
            start_time: Instant::now(),
        }
    }

    /// Fold a finished task's delivery accounting into the totals
    pub fn record_task(&self, stats: &ScanStats) {
        let c = &self.inner;
        c.certs.fetch_add(stats.certs, Ordering::Relaxed);
        c.precerts.fetch_add(stats.precerts, Ordering::Relaxed);
        c.unknown.fetch_add(stats.unknown, Ordering::Relaxed);
        c.unparsable.fetch_add(stats.unparsable, Ordering::Relaxed);
        c.skipped.fetch_add(stats.skipped, Ordering::Relaxed);
        c.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_parse_failures(&self) {
        self.inner.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_artifacts(&self, written: u64, failed: u64) {
        self.inner.artifacts_written.fetch_add(written, Ordering::Relaxed);
        self.inner.artifacts_failed.fetch_add(failed, Ordering::Relaxed);
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> StatsSnapshot {
        let c = &self.inner;
        let elapsed = self.start_time.elapsed();

        let mut snapshot = StatsSnapshot {
            certs: c.certs.load(Ordering::Relaxed),
            precerts: c.precerts.load(Ordering::Relaxed),
            unknown: c.unknown.load(Ordering::Relaxed),
            unparsable: c.unparsable.load(Ordering::Relaxed),
            skipped: c.skipped.load(Ordering::Relaxed),
            parse_failures: c.parse_failures.load(Ordering::Relaxed),
            artifacts_written: c.artifacts_written.load(Ordering::Relaxed),
            artifacts_failed: c.artifacts_failed.load(Ordering::Relaxed),
            tasks_completed: c.tasks_completed.load(Ordering::Relaxed),
            entries_per_minute: 0.0,
            uptime_secs: elapsed.as_secs(),
        };

        if elapsed.as_secs() > 0 {
            snapshot.entries_per_minute =
                (snapshot.delivered() as f64 / elapsed.as_secs() as f64) * 60.0;
        }

        snapshot
    }

    /// Format statistics as a human-readable string
    pub fn format_stats(&self) -> String {
        let s = self.snapshot();
        format!(
            "{} certs | {} precerts | {} unknown | {} unparsed | {:.1} entries/min | uptime: {}",
            s.certs,
            s.precerts,
            s.unknown + s.unparsable,
            s.parse_failures,
            s.entries_per_minute,
            Self::format_uptime(s.uptime_secs)
        )
    }

    /// Format uptime duration
    pub fn format_uptime(secs: u64) -> String {
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}
