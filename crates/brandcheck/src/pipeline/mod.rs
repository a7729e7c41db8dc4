//! Per-asset orchestration: download, concurrent analysis, vocabulary
//! compliance, aggregation and persistence.

pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;

pub use config::PipelineConfig;
pub use context::{RunContext, RunOutcome};
pub use error::PipelineError;
pub use progress::{
    AssetPhase, AssetProgressEvent, BroadcastProgress, NoopProgress, ProgressEvent,
    ProgressReporter,
};
pub use runner::{Pipeline, PipelineServices};
