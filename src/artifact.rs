// src/artifact.rs
//! Raw DER dumps of every delivered leaf and its chain.
//!
//! Names are `{class}-{index:014}-{role}.der` for the leaf and
//! `{class}-{index:014}-{position:02}.der` for chain certificates, so two
//! workers can never target the same file and no locking is needed.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::ct_log::{EntryType, RawLogEntry};

/// Role suffix for the leaf artifact of an entry type
fn leaf_role(entry_type: EntryType) -> &'static str {
    match entry_type {
        EntryType::Certificate => "leaf",
        EntryType::Precertificate => "precert",
        EntryType::Unknown(_) => "unknown",
    }
}

/// File name of the leaf artifact
pub fn leaf_file_name(entry_type: EntryType, index: u64) -> String {
    format!("{}-{:014}-{}.der", entry_type.label(), index, leaf_role(entry_type))
}

/// File name of the chain certificate at `position`
pub fn chain_file_name(entry_type: EntryType, index: u64, position: usize) -> String {
    format!("{}-{:014}-{:02}.der", entry_type.label(), index, position)
}

/// Files written for one entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpReport {
    pub written: u64,
    pub failed: u64,
}

/// Best-effort writer of entry artifacts into a directory
#[derive(Debug, Clone)]
pub struct ArtifactSink {
    dir: PathBuf,
}

impl ArtifactSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the dump directory if needed
    pub async fn prepare(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            anyhow::anyhow!("Failed to create dump directory {:?}: {}", self.dir, e)
        })
    }

    /// Write the leaf and chain of `entry`; failures are logged, never returned
    pub async fn dump(&self, entry: &RawLogEntry) -> DumpReport {
        let mut report = DumpReport::default();
        let class = entry.entry_type.label();

        if !entry.cert.is_empty() {
            let name = leaf_file_name(entry.entry_type, entry.index);
            match fs::write(self.dir.join(&name), &entry.cert).await {
                Ok(()) => report.written += 1,
                Err(e) => {
                    warn!("Failed to dump data for {} at index {}: {}", class, entry.index, e);
                    report.failed += 1;
                }
            }
        }

        for (position, cert) in entry.chain.iter().enumerate() {
            let name = chain_file_name(entry.entry_type, entry.index, position);
            match fs::write(self.dir.join(&name), cert).await {
                Ok(()) => report.written += 1,
                Err(e) => {
                    warn!(
                        "Failed to dump chain certificate {} at index {}: {}",
                        position, entry.index, e
                    );
                    report.failed += 1;
                }
            }
        }

        debug!("Dumped {} files for index {}", report.written, entry.index);
        report
    }
}
