// src/output/mod.rs
//! Sinks for per-entry summaries.
//!
//! Several handlers can be active at once (stdout and a file, for instance).

use crate::types::EntrySummary;
use async_trait::async_trait;
use std::sync::Arc;

pub mod json;

/// Trait for output handlers that receive entry summaries
#[async_trait]
pub trait OutputHandler: Send + Sync {
    /// Emit one entry summary
    async fn emit_summary(&self, summary: &EntrySummary) -> anyhow::Result<()>;

    /// Flush any buffered output
    async fn flush(&self) -> anyhow::Result<()>;
}

/// Manager that dispatches summaries to multiple handlers
#[derive(Default)]
pub struct OutputManager {
    handlers: Vec<Arc<dyn OutputHandler>>,
}

impl OutputManager {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Arc<dyn OutputHandler>) {
        self.handlers.push(handler);
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Emit a summary to all handlers.
    ///
    /// A failing handler is logged and skipped so the others still receive
    /// the record; summaries are derived output and never fail a scan.
    pub async fn emit(&self, summary: &EntrySummary) {
        for handler in &self.handlers {
            if let Err(e) = handler.emit_summary(summary).await {
                tracing::warn!("Output handler error at index {}: {}", summary.index, e);
            }
        }
    }

    /// Flush all handlers
    pub async fn flush(&self) -> anyhow::Result<()> {
        for handler in &self.handlers {
            handler.flush().await?;
        }
        Ok(())
    }
}
