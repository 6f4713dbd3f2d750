// src/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cert_parser::{CertificateParser, ParsedNames};
use crate::ct_log::RawLogEntry;

/// Structured record emitted for every delivered log entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntrySummary {
    /// Leaf index in the CT log
    pub index: u64,

    /// `cert` or `precert`
    pub classification: String,

    /// False when the certificate could not be parsed at all
    pub parsed: bool,

    /// Subject Common Name (best effort)
    pub subject_cn: Option<String>,

    /// Issuer Common Name, or full issuer DN when it has no CN
    pub issuer_cn: Option<String>,

    /// Log timestamp of the leaf (RFC 3339)
    pub logged_at: Option<String>,

    /// SHA-256 of the leaf DER
    pub fingerprint: String,

    /// Number of chain certificates supplied with the entry
    pub chain_len: usize,

    /// Non-fatal parse problems
    #[serde(default)]
    pub warnings: usize,

    /// Fatal parse error, set only when `parsed` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EntrySummary {
    /// Build a summary from a parse attempt over the entry
    pub fn from_entry(entry: &RawLogEntry, parsed: &anyhow::Result<ParsedNames>) -> Self {
        let logged_at = chrono::DateTime::from_timestamp_millis(entry.timestamp as i64)
            .map(|t| t.to_rfc3339());

        let mut summary = Self {
            index: entry.index,
            classification: entry.entry_type.label().to_string(),
            parsed: false,
            subject_cn: None,
            issuer_cn: None,
            logged_at,
            fingerprint: CertificateParser::fingerprint(&entry.cert),
            chain_len: entry.chain.len(),
            warnings: 0,
            error: None,
        };

        match parsed {
            Ok(names) => {
                summary.parsed = true;
                summary.subject_cn = names.subject_cn.clone();
                summary.issuer_cn = names.issuer_cn.clone();
                summary.warnings = names.warnings.len();
            }
            Err(e) => summary.error = Some(e.to_string()),
        }

        summary
    }
}

impl fmt::Display for EntrySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.parsed {
            return write!(
                f,
                "{} at index {}: <unparsed: {}>",
                self.classification,
                self.index,
                self.error.as_deref().unwrap_or("unknown error")
            );
        }

        write!(
            f,
            "{} at index {}: CN: '{}' Issuer: {}",
            self.classification,
            self.index,
            self.subject_cn.as_deref().unwrap_or(""),
            self.issuer_cn.as_deref().unwrap_or("-")
        )
    }
}
