// src/testing.rs
//! In-memory log and recording processor for unit tests.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::ct_log::leaf::fixtures::{precert_leaf, to_log_entry, unknown_leaf, x509_leaf};
use crate::ct_log::{EntryType, LogEntry, LogSource, RawLogEntry};
use crate::processor::Processor;

/// Shape of a fixture leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Cert,
    Precert,
    Unknown,
    Garbage,
}

pub fn build_entries(kinds: &[Kind]) -> Vec<LogEntry> {
    kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| {
            let ts = 1_600_000_000_000 + i as u64;
            match kind {
                Kind::Cert => to_log_entry(x509_leaf(ts, format!("cert-{}", i).as_bytes(), &[b"ca".to_vec()])),
                Kind::Precert => to_log_entry(precert_leaf(
                    ts,
                    b"tbs",
                    format!("precert-{}", i).as_bytes(),
                    &[b"ca".to_vec()],
                )),
                Kind::Unknown => to_log_entry(unknown_leaf(ts, 9)),
                Kind::Garbage => LogEntry {
                    leaf_input: "AAAA".to_string(),
                    extra_data: String::new(),
                },
            }
        })
        .collect()
}

/// A CT log held in memory
pub struct FakeLog {
    entries: Vec<LogEntry>,
    /// Cap on entries per get-entries response
    max_per_response: usize,
    /// Requests whose start falls in this range fail
    fail_range: Option<(u64, u64)>,
    delay: Duration,
    pub requests: Mutex<Vec<(u64, u64)>>,
    pub sth_requests: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeLog {
    pub fn new(entries: Vec<LogEntry>) -> Self {
        Self {
            entries,
            max_per_response: usize::MAX,
            fail_range: None,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            sth_requests: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_kinds(kinds: &[Kind]) -> Self {
        Self::new(build_entries(kinds))
    }

    pub fn max_per_response(mut self, n: usize) -> Self {
        self.max_per_response = n;
        self
    }

    pub fn failing(mut self, start: u64, end: u64) -> Self {
        self.fail_range = Some((start, end));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LogSource for FakeLog {
    async fn tree_size(&self) -> Result<u64> {
        self.sth_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.len() as u64)
    }

    async fn get_entries(&self, start: u64, end: u64) -> Result<Vec<LogEntry>> {
        self.requests.lock().unwrap().push((start, end));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some((lo, hi)) = self.fail_range {
            if start >= lo && start < hi {
                anyhow::bail!("Get entries request failed with status 503");
            }
        }

        let lo = start as usize;
        let hi = ((end + 1) as usize).min(self.entries.len());
        if lo >= hi {
            return Ok(Vec::new());
        }
        let take = (hi - lo).min(self.max_per_response);
        Ok(self.entries[lo..lo + take].to_vec())
    }
}

/// Processor that records every call
#[derive(Default)]
pub struct RecordingProcessor {
    pub calls: Mutex<Vec<(EntryType, u64)>>,
}

impl RecordingProcessor {
    pub fn indices(&self, entry_type: EntryType) -> Vec<u64> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == entry_type)
            .map(|(_, i)| *i)
            .collect()
    }

    pub fn all_indices(&self) -> Vec<u64> {
        self.calls.lock().unwrap().iter().map(|(_, i)| *i).collect()
    }

    /// True when no index was delivered twice
    pub fn no_duplicates(&self) -> bool {
        let all = self.all_indices();
        all.iter().collect::<HashSet<_>>().len() == all.len()
    }
}

#[async_trait]
impl Processor for RecordingProcessor {
    async fn process_cert(&self, entry: &RawLogEntry) {
        self.calls.lock().unwrap().push((EntryType::Certificate, entry.index));
    }

    async fn process_precert(&self, entry: &RawLogEntry) {
        self.calls.lock().unwrap().push((EntryType::Precertificate, entry.index));
    }
}
