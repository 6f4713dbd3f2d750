// src/processor.rs
use async_trait::async_trait;
use tracing::{info, warn};

use crate::artifact::ArtifactSink;
use crate::cert_parser::CertificateParser;
use crate::ct_log::RawLogEntry;
use crate::output::OutputManager;
use crate::stats::StatsCollector;
use crate::types::EntrySummary;

/// Receives every delivered log entry.
///
/// Called from the fetch pipeline's concurrent batch workers, so
/// implementations must tolerate parallel calls. The entry is only borrowed
/// for the duration of the call.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process_cert(&self, entry: &RawLogEntry);

    async fn process_precert(&self, entry: &RawLogEntry);
}

/// Logs a summary of each entry, fans it out to the output handlers and
/// dumps its raw DER files
pub struct EntryProcessor {
    artifacts: Option<ArtifactSink>,
    outputs: OutputManager,
    stats: StatsCollector,
}

impl EntryProcessor {
    pub fn new(artifacts: Option<ArtifactSink>, outputs: OutputManager, stats: StatsCollector) -> Self {
        Self {
            artifacts,
            outputs,
            stats,
        }
    }

    pub fn outputs(&self) -> &OutputManager {
        &self.outputs
    }

    async fn handle(&self, entry: &RawLogEntry, summary: EntrySummary) {
        if summary.parsed {
            info!(
                index = summary.index,
                classification = %summary.classification,
                subject_cn = summary.subject_cn.as_deref().unwrap_or(""),
                issuer_cn = summary.issuer_cn.as_deref().unwrap_or(""),
                warnings = summary.warnings,
                "Process {}",
                summary
            );
        } else {
            self.stats.increment_parse_failures();
            warn!(
                index = summary.index,
                classification = %summary.classification,
                "Process {}",
                summary
            );
        }

        self.outputs.emit(&summary).await;

        if let Some(ref sink) = self.artifacts {
            let report = sink.dump(entry).await;
            self.stats.add_artifacts(report.written, report.failed);
        }
    }
}

#[async_trait]
impl Processor for EntryProcessor {
    async fn process_cert(&self, entry: &RawLogEntry) {
        let parsed = CertificateParser::parse_certificate(&entry.cert);
        self.handle(entry, EntrySummary::from_entry(entry, &parsed)).await;
    }

    async fn process_precert(&self, entry: &RawLogEntry) {
        // Names come from the submitted TBSCertificate; fall back to the
        // full pre-certificate when the leaf carried none
        let parsed = match entry.tbs_certificate {
            Some(ref tbs) => CertificateParser::parse_tbs(tbs),
            None => CertificateParser::parse_certificate(&entry.cert),
        };
        self.handle(entry, EntrySummary::from_entry(entry, &parsed)).await;
    }
}
