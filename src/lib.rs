mod config;
mod error;
mod extract;
mod normalize;
mod pipeline;
mod record;
mod render;
mod snapshot;
mod store;

pub use config::CaptureConfig;
pub use error::PipelineError;
pub use extract::{Extracted, Extractor, Strategy, UNIT_MARKER};
pub use normalize::{
    DateNormalizer, InvalidReason, NormalizedDate, NormalizedPrice, PriceNormalizer,
    PLAUSIBLE_MAX, PLAUSIBLE_MIN,
};
pub use pipeline::{Pipeline, RunReport, RunState};
pub use record::{Confidence, Price, Record, RecordBuilder};
pub use render::{HttpRenderer, PageSession, RawFrame, Renderer};
pub use snapshot::SnapshotStore;
pub use store::{PersistenceStore, CSV_HEADER};
