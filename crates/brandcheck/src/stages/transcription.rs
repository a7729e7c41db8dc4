//! Speech-to-text via an asynchronous submit/poll job.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capability::{CapabilityError, JobState, TranscriptionCapability};
use crate::model::Transcript;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 60;

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Transcription did not finish after {attempts} polls")]
    Timeout { attempts: u32 },

    #[error("Transcription service reported an error: {0}")]
    Service(String),

    #[error("Transcription cancelled")]
    Cancelled,

    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

pub struct TranscriptionStage {
    service: Arc<dyn TranscriptionCapability>,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl TranscriptionStage {
    pub fn new(
        service: Arc<dyn TranscriptionCapability>,
        poll_interval: Duration,
        max_poll_attempts: u32,
    ) -> Self {
        Self {
            service,
            poll_interval,
            max_poll_attempts: max_poll_attempts.max(1),
        }
    }

    /// Submits `media_url` and polls until the job completes, errors, the
    /// attempt ceiling is reached, or `cancel` fires.
    pub async fn transcribe(
        &self,
        media_url: &str,
        cancel: &CancellationToken,
    ) -> Result<Transcript, TranscriptionError> {
        let job_id = tokio::select! {
            _ = cancel.cancelled() => return Err(TranscriptionError::Cancelled),
            submitted = self.service.submit(media_url) => submitted?,
        };
        info!(job_id = %job_id, "Transcription job submitted");

        for attempt in 1..=self.max_poll_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Err(TranscriptionError::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            // A failed poll uses up an attempt but does not end the run.
            let job = match self.service.status(&job_id).await {
                Ok(job) => job,
                Err(e) => {
                    warn!(job_id = %job_id, attempt, error = %e, "Transcription poll failed");
                    continue;
                }
            };
            debug!(job_id = %job_id, attempt, state = ?job.state, "Polled transcription job");

            if !job.state.is_terminal() {
                continue;
            }
            if job.state == JobState::Error {
                return Err(TranscriptionError::Service(
                    job.error.unwrap_or_else(|| "unknown error".to_string()),
                ));
            }
            return Ok(Transcript {
                job_id,
                text: job.text.unwrap_or_default(),
                words: job.words,
                duration_secs: job.duration_secs,
            });
        }

        Err(TranscriptionError::Timeout {
            attempts: self.max_poll_attempts,
        })
    }
}
