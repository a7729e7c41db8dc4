//! AssemblyAI-style transcription client.
//!
//! Jobs are created with `POST {endpoint}/v2/transcript` and polled with
//! `GET {endpoint}/v2/transcript/{id}`. The key goes in the bare
//! `authorization` header.

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use super::{
    create_http_client, truncate_error_body, CapabilityError, HttpTimeouts, JobState,
    TranscriptionCapability, TranscriptionJob,
};
use crate::model::TranscriptWord;

pub struct AssemblyAiClient {
    client: Client,
    endpoint: String,
    api_key: SecretString,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    words: Option<Vec<WordResponse>>,
    #[serde(default)]
    audio_duration: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WordResponse {
    text: String,
    start: u64,
    end: u64,
    #[serde(default)]
    confidence: f64,
}

impl StatusResponse {
    fn into_job(self) -> Result<TranscriptionJob, CapabilityError> {
        let state = match self.status.as_str() {
            "queued" => JobState::Queued,
            "processing" => JobState::Processing,
            "completed" => JobState::Completed,
            "error" => JobState::Error,
            other => {
                return Err(CapabilityError::InvalidResponse(format!(
                    "Unknown transcription status '{}'",
                    other
                )))
            }
        };

        let words = self
            .words
            .unwrap_or_default()
            .into_iter()
            .map(|w| TranscriptWord {
                text: w.text,
                start_ms: w.start,
                end_ms: w.end,
                confidence: w.confidence,
            })
            .collect();

        Ok(TranscriptionJob {
            state,
            text: self.text,
            words,
            duration_secs: self.audio_duration,
            error: self.error,
        })
    }
}

impl AssemblyAiClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: SecretString,
        timeouts: HttpTimeouts,
    ) -> Result<Self, CapabilityError> {
        Ok(Self {
            client: create_http_client(timeouts)?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn transcript_url(&self) -> String {
        format!("{}/v2/transcript", self.endpoint)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("authorization", self.api_key.expose_secret())
    }

    async fn check(response: Response) -> Result<Response, CapabilityError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(CapabilityError::UnexpectedStatus {
            status,
            body: truncate_error_body(&body),
        })
    }
}

#[async_trait]
impl TranscriptionCapability for AssemblyAiClient {
    async fn submit(&self, media_url: &str) -> Result<String, CapabilityError> {
        let request = self
            .client
            .post(self.transcript_url())
            .json(&json!({ "audio_url": media_url, "punctuate": true }));
        let response = Self::check(self.authorized(request).send().await?).await?;

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(format!("Failed to parse job: {}", e)))?;

        debug!("Submitted transcription job {}", submitted.id);
        Ok(submitted.id)
    }

    async fn status(&self, job_id: &str) -> Result<TranscriptionJob, CapabilityError> {
        let url = format!("{}/{}", self.transcript_url(), job_id);
        let response = Self::check(self.authorized(self.client.get(url)).send().await?).await?;

        let parsed: StatusResponse = response.json().await.map_err(|e| {
            CapabilityError::InvalidResponse(format!("Failed to parse job status: {}", e))
        })?;
        parsed.into_job()
    }
}
