use thiserror::Error;

/// Errors that end a run as `failed`. Stage failures are not here; they
/// are recorded in the results and the run continues.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Download failed: {0}")]
    Download(#[from] crate::error::StorageError),

    #[error("Persistence failed: {0}")]
    Persist(#[from] crate::db::DatabaseError),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Run finished without a report")]
    MissingReport,
}

impl PipelineError {
    /// Stage name recorded in `error_detail`.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Download(_) => "download",
            PipelineError::Persist(_) => "persist",
            PipelineError::Cancelled => "cancelled",
            PipelineError::MissingReport => "aggregate",
        }
    }
}
