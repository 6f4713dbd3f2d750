// src/main.rs
use clap::Parser;
use ct_scanlog::artifact::ArtifactSink;
use ct_scanlog::cli::Cli;
use ct_scanlog::config::Config;
use ct_scanlog::director::{Director, FailureLogger, TracingLogger};
use ct_scanlog::output::{json, OutputManager};
use ct_scanlog::processor::EntryProcessor;
use ct_scanlog::progress::ScanProgress;
use ct_scanlog::stats::StatsCollector;
use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let progress = ScanProgress::new(
        cli.should_show_progress() && is_terminal::is_terminal(std::io::stderr()),
    );

    // RUST_LOG wins; otherwise flags now, config level once it is loaded
    let from_env = EnvFilter::try_from_default_env().ok();
    let pinned = from_env.is_some();
    let initial = from_env.unwrap_or_else(|| EnvFilter::new(cli.log_level("info")));
    let (filter, filter_handle) = reload::Layer::new(initial);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(progress.clone()))
        .init();

    let config = match cli.load_config(&TracingLogger) {
        Ok(config) => config,
        Err(_) => return ExitCode::FAILURE,
    };

    if !pinned {
        let level = EnvFilter::new(cli.log_level(&config.logging.level));
        if let Err(e) = filter_handle.reload(level) {
            tracing::warn!("Keeping startup log level: {}", e);
        }
    }

    match run(&cli, config, progress, Arc::new(TracingLogger)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Director and setup failures were already reported
            tracing::debug!("Exiting after fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    cli: &Cli,
    config: Config,
    progress: ScanProgress,
    logger: Arc<dyn FailureLogger>,
) -> anyhow::Result<()> {
    tracing::info!("Starting ct-scanlog for {}", config.scan.log_uri);

    let stats = StatsCollector::new();

    let outputs = match build_outputs(cli, &config) {
        Ok(outputs) => outputs,
        Err(e) => {
            logger.fatal(&e);
            return Err(e);
        }
    };

    let artifacts = if config.output.dump_artifacts {
        let sink = ArtifactSink::new(&config.output.dump_dir);
        if let Err(e) = sink.prepare().await {
            logger.fatal(&e);
            return Err(e);
        }
        tracing::info!("Writing DER artifacts to {}", sink.dir().display());
        Some(sink)
    } else {
        tracing::info!("Artifact dumping disabled");
        None
    };

    let processor = Arc::new(EntryProcessor::new(artifacts, outputs, stats.clone()));

    let mut director = Director::from_config(
        &config,
        processor.clone(),
        logger,
        stats.clone(),
        progress.clone(),
    )
    .await?;

    if cli.stats {
        let stats_clone = stats.clone();
        let progress_clone = progress.clone();
        let interval = cli.stats_interval;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(interval)).await;
                let msg = stats_clone.format_stats();

                if progress_clone.is_enabled() {
                    progress_clone.set_message(msg);
                } else {
                    eprintln!("{}", msg);
                }
            }
        });
    }

    let outcome = director.run().await;

    if let Err(e) = processor.outputs().flush().await {
        tracing::warn!("Failed to flush summaries: {:#}", e);
    }

    if cli.stats {
        let snapshot = stats.snapshot();
        eprintln!("\nFinal Statistics:");
        eprintln!("  Certificates: {}", snapshot.certs);
        eprintln!("  Pre-certificates: {}", snapshot.precerts);
        eprintln!("  Unknown / unparsable: {} / {}", snapshot.unknown, snapshot.unparsable);
        eprintln!("  Skipped: {}", snapshot.skipped);
        eprintln!(
            "  Artifacts written: {} ({} failed)",
            snapshot.artifacts_written, snapshot.artifacts_failed
        );
        eprintln!("  Rate: {:.1} entries/min", snapshot.entries_per_minute);
        eprintln!("  Uptime: {}", StatsCollector::format_uptime(snapshot.uptime_secs));
    }

    let summary = outcome?;
    tracing::info!(
        "Done: scanned [{}, {}) in {} tasks",
        summary.first_index,
        summary.next_index,
        summary.tasks
    );

    Ok(())
}

fn build_outputs(cli: &Cli, config: &Config) -> anyhow::Result<OutputManager> {
    let mut outputs = OutputManager::new();

    if cli.json {
        outputs.add_handler(Arc::new(json::JsonOutput::new()));
    }

    if let Some(ref path) = config.output.summary_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| anyhow::anyhow!("cannot open summary file {}: {}", path, e))?;
        outputs.add_handler(Arc::new(json::JsonOutput::to_file(file)));
        tracing::info!("Writing JSON summaries to: {}", path);
    }

    if outputs.is_empty() {
        tracing::debug!("No summary outputs configured, entries are logged only");
    }

    Ok(outputs)
}
