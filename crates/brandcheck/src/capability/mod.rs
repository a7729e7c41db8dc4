//! Narrow interfaces to the external AI capabilities.
//!
//! The stages only ever see these traits; the vendor clients in the
//! submodules are one implementation each, constructed with explicit
//! credentials from configuration.

pub mod assemblyai;
pub mod chat;
pub mod error;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::model::TranscriptWord;

pub use assemblyai::AssemblyAiClient;
pub use chat::ChatCompletionsClient;
pub use error::CapabilityError;

/// Vision-capable model: turns an image plus instructions into text.
#[async_trait]
pub trait VisionCapability: Send + Sync {
    async fn describe_image(
        &self,
        image: &[u8],
        mime_type: &str,
        instructions: &str,
    ) -> Result<String, CapabilityError>;
}

/// Speech-to-text service with asynchronous jobs.
#[async_trait]
pub trait TranscriptionCapability: Send + Sync {
    /// Submits a fetchable media URL and returns the job identifier.
    async fn submit(&self, media_url: &str) -> Result<String, CapabilityError>;

    async fn status(&self, job_id: &str) -> Result<TranscriptionJob, CapabilityError>;
}

/// Text-in, text-out reasoning model.
#[async_trait]
pub trait LanguageCapability: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CapabilityError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Error,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Error)
    }
}

/// Snapshot of a transcription job as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionJob {
    pub state: JobState,
    pub text: Option<String>,
    pub words: Vec<TranscriptWord>,
    pub duration_secs: Option<f64>,
    pub error: Option<String>,
}

impl TranscriptionJob {
    pub fn in_progress(state: JobState) -> Self {
        Self {
            state,
            text: None,
            words: Vec::new(),
            duration_secs: None,
            error: None,
        }
    }
}

/// Client-side timeouts applied to every capability request.
#[derive(Debug, Clone, Copy)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(60),
        }
    }
}

/// Creates an HTTP client with the given timeouts.
pub(crate) fn create_http_client(timeouts: HttpTimeouts) -> Result<Client, CapabilityError> {
    Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.request)
        .user_agent(concat!("brandcheck/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| CapabilityError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Maximum length of a response body quoted in an error message.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Truncates a provider error body so it does not flood logs.
pub(crate) fn truncate_error_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let truncated: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", truncated)
    } else {
        body.to_string()
    }
}
