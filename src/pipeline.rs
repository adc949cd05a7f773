use std::fmt;
use std::path::PathBuf;

use chrono::Local;
use log::{error, info, warn};

use crate::config::CaptureConfig;
use crate::error::PipelineError;
use crate::extract::{Extracted, Extractor};
use crate::record::{Record, RecordBuilder};
use crate::render::Renderer;
use crate::snapshot::SnapshotStore;
use crate::store::PersistenceStore;

/// Orchestrator states. `Failed` is reachable from any non-terminal state;
/// only rendering and persistence can actually take a run there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Rendering,
    Extracting,
    Normalizing,
    SnapshotCapturing,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Init => "init",
            RunState::Rendering => "rendering",
            RunState::Extracting => "extracting",
            RunState::Normalizing => "normalizing",
            RunState::SnapshotCapturing => "snapshot_capturing",
            RunState::Persisting => "persisting",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub record: Record,
    pub partition: PathBuf,
}

/// Sequences render -> extract -> normalize -> snapshot -> persist, isolating
/// failures per stage: extraction and normalization misses degrade the record,
/// snapshot failure never blocks persistence, and a render failure still gets
/// a degraded record persisted so no run goes unrecorded.
pub struct Pipeline {
    target_url: String,
    extractor: Extractor,
    builder: RecordBuilder,
    snapshots: SnapshotStore,
    store: PersistenceStore,
}

impl Pipeline {
    pub fn new(config: &CaptureConfig) -> anyhow::Result<Self> {
        Ok(Self {
            target_url: config.target_url.clone(),
            extractor: Extractor::new()?,
            builder: RecordBuilder::new(),
            snapshots: SnapshotStore::new(&config.screenshot_dir),
            store: PersistenceStore::new(&config.csv_dir),
        })
    }

    pub async fn run<R: Renderer>(&self, renderer: &R) -> Result<RunReport, PipelineError> {
        let mut state = RunState::Init;
        advance(&mut state, RunState::Rendering);

        // The page session is owned by this scope; every exit path below,
        // early or not, drops it.
        let page = match renderer.render(&self.target_url).await {
            Ok(page) => page,
            Err(e) => {
                advance(&mut state, RunState::Failed);
                error!("rendering {} failed: {e:#}", self.target_url);
                self.persist_render_failure();
                return Err(PipelineError::Render(format!("{e:#}")));
            }
        };
        if let Some(title) = page.title() {
            info!("rendered {} ({title})", page.url());
        }

        advance(&mut state, RunState::Extracting);
        let price = self.extractor.extract_price(page.as_ref());
        let date = self.extractor.extract_date(page.as_ref());
        if price == Extracted::Unmatched {
            warn!("no extraction strategy matched a price; record will be degraded");
        }

        advance(&mut state, RunState::Normalizing);
        let captured_at = Local::now();
        let record = self.builder.build(captured_at, &date, &price);

        advance(&mut state, RunState::SnapshotCapturing);
        let record = match self.snapshots.capture(page.as_ref(), captured_at) {
            Some(reference) => record.with_snapshot(reference),
            None => {
                warn!("continuing without a snapshot reference");
                record
            }
        };

        advance(&mut state, RunState::Persisting);
        let partition = match self.store.append(&record) {
            Ok(partition) => partition,
            Err(e) => {
                advance(&mut state, RunState::Failed);
                return Err(e);
            }
        };

        advance(&mut state, RunState::Done);
        info!(
            "capture done: date {} price {} confidence {} strategy {}",
            record.trade_date,
            record.price,
            record.confidence.as_str(),
            record.strategy_label(),
        );
        Ok(RunReport { record, partition })
    }

    /// A run whose page never rendered is still recorded: capture date,
    /// explicitly invalid price, degraded confidence.
    fn persist_render_failure(&self) {
        let record = self.builder.degraded(Local::now());
        match self.store.append(&record) {
            Ok(partition) => info!(
                "degraded record persisted after render failure: {}",
                partition.display()
            ),
            Err(e) => error!("could not persist degraded record after render failure: {e}"),
        }
    }
}

fn advance(state: &mut RunState, next: RunState) {
    info!("pipeline state: {state} -> {next}");
    *state = next;
}
