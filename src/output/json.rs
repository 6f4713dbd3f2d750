// src/output/json.rs
//! JSON Lines (JSONL) output handler

use crate::output::OutputHandler;
use crate::types::EntrySummary;
use async_trait::async_trait;
use std::io::{self, Write};
use std::sync::Mutex;

/// JSON Lines output handler
///
/// Outputs one JSON object per line (JSONL/NDJSON format)
pub struct JsonOutput {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonOutput {
    /// Create a new JsonOutput that writes to stdout
    pub fn new() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// Create a new JsonOutput that writes to a file
    pub fn to_file(file: std::fs::File) -> Self {
        Self::to_writer(Box::new(io::BufWriter::new(file)))
    }

    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputHandler for JsonOutput {
    async fn emit_summary(&self, summary: &EntrySummary) -> anyhow::Result<()> {
        let json = serde_json::to_string(summary)?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("JSON output writer poisoned"))?;
        writeln!(writer, "{}", json)?;

        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("JSON output writer poisoned"))?;
        writer.flush()?;
        Ok(())
    }
}
