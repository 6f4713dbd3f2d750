// src/progress.rs
//! Scan progress display using indicatif

use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

/// Spinner showing the scan cursor; inert when disabled
#[derive(Clone)]
pub struct ScanProgress {
    spinner: Option<ProgressBar>,
}

impl ScanProgress {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self { spinner: None };
        }

        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(100));

        Self {
            spinner: Some(spinner),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.spinner.is_some()
    }

    /// Show the cursor against the end bound (None while following the tree)
    pub fn set_cursor(&self, cursor: u64, end: Option<u64>) {
        self.set_message(Self::cursor_message(cursor, end));
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(msg.into());
        }
    }

    /// Temporarily hide the spinner to print other output
    pub fn suspend<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        match self.spinner {
            Some(ref spinner) => spinner.suspend(f),
            None => f(),
        }
    }

    pub fn finish(&self) {
        if let Some(ref spinner) = self.spinner {
            spinner.finish_and_clear();
        }
    }

    fn cursor_message(cursor: u64, end: Option<u64>) -> String {
        match end {
            Some(end) if end > 0 => {
                let pct = (cursor.min(end) as f64 / end as f64) * 100.0;
                format!("index {} / {} ({:.1}%)", cursor, end, pct)
            }
            _ => format!("index {} (following tree head)", cursor),
        }
    }
}

/// Log writer that hides the spinner while a line goes to stderr
pub struct SpinnerWriter<'a> {
    progress: &'a ScanProgress,
}

impl Write for SpinnerWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.progress.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for ScanProgress {
    type Writer = SpinnerWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SpinnerWriter { progress: self }
    }
}

impl Drop for ScanProgress {
    fn drop(&mut self) {
        self.finish();
    }
}
