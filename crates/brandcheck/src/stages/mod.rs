//! Analysis stages run by the pipeline.
//!
//! Each stage is independent: a failure is reported as a [`StageError`] and
//! recorded by the pipeline, never propagated to the caller.

pub mod classifier;
pub mod compliance;
pub mod prompt;
pub mod transcription;
pub mod visual;

use thiserror::Error;

use crate::capability::CapabilityError;

pub use classifier::AuthenticityClassifier;
pub use compliance::ComplianceChecker;
pub use transcription::{TranscriptionError, TranscriptionStage};
pub use visual::{
    Frame, FrameExtractor, IndicatorExtractor, KeywordIndicatorExtractor, NoFrameExtractor,
    VisualAnalysisStage,
};

#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("{0} returned an empty response")]
    EmptyResponse(&'static str),
}
