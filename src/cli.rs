// src/cli.rs
use clap::Parser;
use std::path::Path;

use crate::config::Config;
use crate::director::FailureLogger;

/// ct-scanlog: Certificate Transparency log scanner
///
/// Walks a CT log's entries in parallel batches, summarizing every
/// certificate and pre-certificate and dumping their raw DER files.
/// Progress is checkpointed so an interrupted scan resumes where it stopped.
#[derive(Parser, Debug, Clone)]
#[command(name = "ct-scanlog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    // ===== Input & Configuration =====
    /// Path to TOML config file
    #[arg(short = 'c', long = "config", default_value = "config.toml")]
    pub config: String,

    // ===== Output =====
    /// Write entry summaries as JSON lines to stdout
    #[arg(short = 'j', long = "json")]
    pub json: bool,

    /// Write entry summaries as JSON lines to a file
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,

    /// Override the artifact directory from config
    #[arg(long = "dump-dir")]
    pub dump_dir: Option<String>,

    /// Do not write DER artifacts
    #[arg(long = "no-dump")]
    pub no_dump: bool,

    // ===== Scanning =====
    /// Keep polling the tree head after catching up
    #[arg(long = "follow")]
    pub follow: bool,

    // ===== Display & Statistics =====
    /// Display periodic statistics
    #[arg(long = "stats")]
    pub stats: bool,

    /// Stats update interval in seconds
    #[arg(long = "stats-interval", default_value = "10")]
    pub stats_interval: u64,

    /// Disable progress indicator
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    // ===== Logging =====
    /// Verbose logging (set log level to debug)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet logging (set log level to warn)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Cli {
    /// Validate flag combinations and return errors for invalid usage
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.verbose && self.quiet {
            anyhow::bail!("Cannot specify both --verbose and --quiet");
        }

        if self.no_dump && self.dump_dir.is_some() {
            anyhow::bail!("Cannot use --dump-dir with --no-dump");
        }

        if self.stats && self.stats_interval == 0 {
            anyhow::bail!("--stats-interval must be greater than 0");
        }

        if let Some(ref path) = self.output {
            if path.trim().is_empty() {
                anyhow::bail!("--output needs a file path");
            }
        }

        Ok(())
    }

    /// Check the flags, load the config file and apply the flag overrides.
    /// Failures are reported through `logger` before being returned.
    pub fn load_config(&self, logger: &dyn FailureLogger) -> anyhow::Result<Config> {
        let loaded = self.validate().and_then(|()| {
            let mut config = Config::from_file(Path::new(&self.config))?;
            self.apply(&mut config);
            // Overrides such as --follow can invalidate a loaded config
            config.validate()?;
            Ok(config)
        });

        if let Err(ref e) = loaded {
            logger.fatal(e);
        }
        loaded
    }

    /// Apply flag overrides on top of the loaded config
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref dir) = self.dump_dir {
            config.output.dump_dir = dir.clone();
        }
        if self.no_dump {
            config.output.dump_artifacts = false;
        }
        if let Some(ref path) = self.output {
            config.output.summary_file = Some(path.clone());
        }
        if self.follow {
            config.scan.follow = true;
        }
    }

    /// Progress spinner is off when JSON goes to stdout
    pub fn should_show_progress(&self) -> bool {
        !self.no_progress && !self.json
    }

    /// Log level from verbose/quiet flags, falling back to the config value
    pub fn log_level<'a>(&self, configured: &'a str) -> &'a str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            configured
        }
    }
}
