// doorwatch-core: correlation pipeline between smart-lock polls and camera frames.

pub mod classify;
pub mod compose;
pub mod config;
pub mod convert;
pub mod dedup;
pub mod error;
pub mod gate;
pub mod log;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use classify::{ClassificationStage, Classifier, HttpClassifier, select_best};
pub use compose::AlertMessageComposer;
pub use config::{FrameRoute, GateScope, PipelineConfig};
pub use convert::LockRecordNormalizer;
pub use dedup::{DedupRecord, LockChangeDeduplicator};
pub use error::CoreError;
pub use gate::{FrameRouter, GateDecision, ImageGate};
pub use log::DurableLog;
pub use pipeline::{Changelogs, Pipeline, PipelineStats, StatsSnapshot};
pub use store::{AlertGateStore, GateTable, GateUpdate};
pub use stream::GateWatch;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    AlertMessage, CameraFrame, ClassificationResult, GateKey, GateState, LockId, LockSnapshot,
    LockState, LockTransition, PhotoAlert, SiteId, TextAlert,
};
