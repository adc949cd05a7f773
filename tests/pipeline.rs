use std::fs;
use std::path::Path;

use argentum::{
    CaptureConfig, Confidence, PageSession, PersistenceStore, Pipeline, PipelineError, Price,
    RawFrame, Renderer, CSV_HEADER,
};
use chrono::Local;
use tempfile::tempdir;

struct StubPage {
    text: String,
    png: Option<Vec<u8>>,
}

impl PageSession for StubPage {
    fn url(&self) -> &str {
        "stub://silver"
    }
    fn title(&self) -> Option<String> {
        Some("Silver Price Today".to_string())
    }
    fn body_text(&self) -> &str {
        &self.text
    }
    fn select_text(&self, _css: &str) -> Vec<String> {
        vec![]
    }
    fn capture_page_png(&self) -> Option<Vec<u8>> {
        self.png.clone()
    }
    fn capture_raw_frame(&self) -> Option<RawFrame> {
        None
    }
}

/// Render collaborator stub: canned page text, or unreachable when `None`.
struct StubRenderer {
    body: Option<String>,
}

impl Renderer for StubRenderer {
    async fn render(&self, _url: &str) -> anyhow::Result<Box<dyn PageSession>> {
        match &self.body {
            Some(text) => Ok(Box::new(StubPage {
                text: text.clone(),
                png: None,
            })),
            None => Err(anyhow::anyhow!("collaborator unreachable")),
        }
    }
}

fn config(root: &Path) -> CaptureConfig {
    let config = CaptureConfig {
        target_url: "stub://silver".to_string(),
        csv_dir: root.join("csv"),
        screenshot_dir: root.join("screenshots"),
        render_timeout_secs: 1,
        ready_marker: String::new(),
    };
    fs::create_dir_all(&config.csv_dir).unwrap();
    fs::create_dir_all(&config.screenshot_dir).unwrap();
    config
}

#[tokio::test]
async fn successful_run_appends_one_row_and_a_snapshot() {
    let root = tempdir().unwrap();
    let config = config(root.path());
    let pipeline = Pipeline::new(&config).unwrap();
    let body = "SMM Silver Original 9,351 CNY/kg updated Jul 24, 2025";
    let renderer = StubRenderer {
        body: Some(body.to_string()),
    };

    let report = pipeline.run(&renderer).await.unwrap();

    assert_eq!(report.record.price, Price::Observed(9351));
    assert_eq!(report.record.trade_date.to_string(), "2025-07-24");
    assert_eq!(report.record.confidence, Confidence::Normal);

    let snapshot = report
        .record
        .snapshot_reference
        .as_ref()
        .expect("text fallback snapshot expected");
    assert_eq!(fs::read(snapshot).unwrap(), body.as_bytes());

    let contents = fs::read_to_string(&report.partition).unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains(",9351,"));
}

#[tokio::test]
async fn marker_free_page_still_persists_a_degraded_record() {
    let root = tempdir().unwrap();
    let config = config(root.path());
    let pipeline = Pipeline::new(&config).unwrap();
    let renderer = StubRenderer {
        body: Some("nothing price-shaped on this page".to_string()),
    };

    let report = pipeline.run(&renderer).await.unwrap();

    assert_eq!(report.record.price, Price::Invalid);
    assert_eq!(report.record.confidence, Confidence::Degraded);
    assert_eq!(report.record.strategy_label(), "none");

    let contents = fs::read_to_string(&report.partition).unwrap();
    let row = contents.lines().nth(1).unwrap();
    assert_eq!(row.split(',').nth(2).unwrap(), "invalid");
}

#[tokio::test]
async fn snapshot_failure_does_not_block_persistence() {
    let root = tempdir().unwrap();
    let config = config(root.path());
    let pipeline = Pipeline::new(&config).unwrap();
    // Empty body: every snapshot method comes back empty.
    let renderer = StubRenderer {
        body: Some(String::new()),
    };

    let report = pipeline.run(&renderer).await.unwrap();

    assert!(report.record.snapshot_reference.is_none());
    assert!(report.partition.exists());
}

#[tokio::test]
async fn render_failure_persists_degraded_record_and_surfaces_typed_error() {
    let root = tempdir().unwrap();
    let config = config(root.path());
    let csv_dir = config.csv_dir.clone();
    let pipeline = Pipeline::new(&config).unwrap();
    let renderer = StubRenderer { body: None };

    let err = pipeline.run(&renderer).await.unwrap_err();
    assert!(matches!(err, PipelineError::Render(_)));

    // The run is not silently unrecorded.
    let partition =
        PersistenceStore::new(csv_dir).partition_path(Local::now().date_naive());
    let contents = fs::read_to_string(&partition).unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1].split(',').nth(2).unwrap(), "invalid");
}
