// End-to-end scans against a CT log served over HTTP
mod common;

use common::{Kind, TestLog};
use ct_scanlog::artifact::ArtifactSink;
use ct_scanlog::config::Config;
use ct_scanlog::director::{Director, TracingLogger};
use ct_scanlog::error::ScanError;
use ct_scanlog::output::{json::JsonOutput, OutputManager};
use ct_scanlog::processor::EntryProcessor;
use ct_scanlog::progress::ScanProgress;
use ct_scanlog::scheduler::Checkpoint;
use ct_scanlog::stats::StatsCollector;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn checkpoint_path(&self) -> PathBuf {
        self.dir.path().join("checkpoint.json")
    }

    fn dump_dir(&self) -> PathBuf {
        self.dir.path().join("der")
    }

    fn summary_path(&self) -> PathBuf {
        self.dir.path().join("summaries.jsonl")
    }

    fn config(&self, log_uri: &str, batch_size: u64, concurrency: &str) -> Config {
        Config::from_toml(&format!(
            r#"
[scan]
log_uri = "{}"
save_data = "{}"
batch_size = {}
concurrency = "{}"

[output]
dump_dir = "{}"
"#,
            log_uri,
            self.checkpoint_path().display(),
            batch_size,
            concurrency,
            self.dump_dir().display()
        ))
        .unwrap()
    }

    async fn checkpoint(&self) -> Option<Checkpoint> {
        Checkpoint::load(&self.checkpoint_path()).await.unwrap()
    }

    fn summaries(&self) -> Vec<serde_json::Value> {
        std::fs::read_to_string(self.summary_path())
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

/// Build the same pipeline the binary does and run it to completion
async fn scan(workspace: &Workspace, config: &Config) -> anyhow::Result<ct_scanlog::director::RunSummary> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(workspace.summary_path())
        .unwrap();
    let mut outputs = OutputManager::new();
    outputs.add_handler(Arc::new(JsonOutput::to_file(file)));

    let sink = ArtifactSink::new(&config.output.dump_dir);
    sink.prepare().await.unwrap();

    let processor = Arc::new(EntryProcessor::new(Some(sink), outputs, StatsCollector::new()));
    let mut director = Director::from_config(
        config,
        processor.clone(),
        Arc::new(TracingLogger),
        StatsCollector::new(),
        ScanProgress::new(false),
    )
    .await?;

    let outcome = director.run().await;
    processor.outputs().flush().await.unwrap();
    outcome
}

fn exists(dir: &Path, name: &str) -> bool {
    dir.join(name).exists()
}

#[tokio::test]
async fn test_scan_mixed_log_over_http() {
    use Kind::*;
    let kinds = [Cert, Precert, Cert, Cert, Precert, Cert, Precert, Cert, Precert, Cert];
    let log = TestLog::start(&kinds, usize::MAX).await;
    let workspace = Workspace::new();

    let summary = scan(&workspace, &workspace.config(&log.uri(), 5, "2"))
        .await
        .unwrap();

    assert_eq!(summary.stats.certs, 6);
    assert_eq!(summary.stats.precerts, 4);
    assert_eq!(summary.next_index, 10);

    let mut records = workspace.summaries();
    records.sort_by_key(|r| r["index"].as_u64().unwrap());
    assert_eq!(records.len(), 10);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record["index"], i as u64);
        assert_eq!(record["parsed"], true);
        assert_eq!(record["subject_cn"], format!("host-{}.example.com", i));
        assert_eq!(record["issuer_cn"], "Integration CA");
        assert_eq!(record["chain_len"], 1);
    }
    assert_eq!(records[1]["classification"], "precert");
    assert_eq!(records[2]["classification"], "cert");

    let der = workspace.dump_dir();
    assert!(exists(&der, "cert-00000000000000-leaf.der"));
    assert!(exists(&der, "cert-00000000000000-00.der"));
    assert!(exists(&der, "precert-00000000000001-precert.der"));
    assert!(exists(&der, "precert-00000000000001-00.der"));
    assert!(!exists(&der, "cert-00000000000001-leaf.der"));
    assert_eq!(std::fs::read_dir(&der).unwrap().count(), 20);

    let checkpoint = workspace.checkpoint().await.unwrap();
    assert_eq!(checkpoint.start, 10);
    assert_eq!(checkpoint.current_batch, 2);
    assert_eq!(checkpoint.log_uri, log.uri());
}

#[tokio::test]
async fn test_short_pages_are_followed_up() {
    let log = TestLog::start(&[Kind::Cert; 17], 4).await;
    let workspace = Workspace::new();

    let summary = scan(&workspace, &workspace.config(&log.uri(), 8, "3"))
        .await
        .unwrap();

    assert_eq!(summary.stats.certs, 17);
    assert_eq!(workspace.summaries().len(), 17);
    // Each 8-wide batch needs two 4-entry pages, the last one a single page
    assert_eq!(log.entries_requests().await, 5);
}

#[tokio::test]
async fn test_resume_after_restart_scans_only_new_entries() {
    let log = TestLog::start(&[Kind::Cert; 6], usize::MAX).await;
    let workspace = Workspace::new();
    let config = workspace.config(&log.uri(), 4, "1");

    let first = scan(&workspace, &config).await.unwrap();
    assert_eq!(first.next_index, 6);

    log.grow(&[Kind::Precert; 5]);
    let second = scan(&workspace, &config).await.unwrap();

    assert_eq!(second.first_index, 6);
    assert_eq!(second.next_index, 11);
    assert_eq!(second.stats.certs, 0);
    assert_eq!(second.stats.precerts, 5);

    // Every index summarized exactly once across both runs
    let mut indices: Vec<u64> = workspace
        .summaries()
        .iter()
        .map(|r| r["index"].as_u64().unwrap())
        .collect();
    indices.sort();
    assert_eq!(indices, (0..11).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_caught_up_log_is_a_no_op() {
    let log = TestLog::start(&[Kind::Cert; 3], usize::MAX).await;
    let workspace = Workspace::new();
    let config = workspace.config(&log.uri(), 10, "1");

    scan(&workspace, &config).await.unwrap();
    let requests = log.entries_requests().await;

    let again = scan(&workspace, &config).await.unwrap();
    assert_eq!(again.tasks, 0);
    assert_eq!(again.stats.total(), 0);
    assert_eq!(log.entries_requests().await, requests);
}

#[tokio::test]
async fn test_server_error_is_fatal_and_checkpoint_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ct/v1/get-sth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "tree_size": 100,
            "timestamp": 0,
            "sha256_root_hash": ""
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ct/v1/get-entries"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend down"))
        .mount(&server)
        .await;

    let workspace = Workspace::new();
    let config = workspace.config(&server.uri(), 10, "2");

    // Resume from an existing checkpoint
    Checkpoint {
        log_uri: server.uri(),
        current_batch: 3,
        batch_size: 10,
        save_data: workspace.checkpoint_path().display().to_string(),
        start: 30,
        end: 0,
    }
    .save(&workspace.checkpoint_path())
    .await
    .unwrap();

    let err = scan(&workspace, &config).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ScanError>(),
        Some(ScanError::Fetch { start: 30, end: 40, .. })
    ));

    let checkpoint = workspace.checkpoint().await.unwrap();
    assert_eq!(checkpoint.start, 30);
    assert_eq!(checkpoint.current_batch, 3);
    assert!(workspace.summaries().is_empty());
}
