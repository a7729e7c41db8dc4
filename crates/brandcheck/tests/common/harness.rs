//! Test harness for isolated pipeline runs.
//!
//! Every harness owns a temp directory used as the asset store root, an
//! in-memory SQLite database and scripted stand-ins for the three AI
//! capabilities. Replies can be changed between runs.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use brandcheck::capability::{
    CapabilityError, JobState, LanguageCapability, TranscriptionCapability, TranscriptionJob,
    VisionCapability,
};
use brandcheck::db::{AssetRepository, Database, SqliteAssetRepository};
use brandcheck::model::{BrandConfig, CreativeAsset, TranscriptWord};
use brandcheck::pipeline::{
    NoopProgress, Pipeline, PipelineConfig, PipelineServices, ProgressReporter, RunOutcome,
};
use brandcheck::storage::FilesystemStore;

pub const PUBLIC_BASE_URL: &str = "https://cdn.example.com/creatives";

/// Vision model returning a fixed reply, or failing when the reply is `Err`.
pub struct ScriptedVision {
    reply: Mutex<Result<String, String>>,
    pub calls: AtomicU32,
}

#[async_trait]
impl VisionCapability for ScriptedVision {
    async fn describe_image(
        &self,
        _image: &[u8],
        _mime_type: &str,
        _instructions: &str,
    ) -> Result<String, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.lock().unwrap().clone().map_err(CapabilityError::Http)
    }
}

/// What the scripted speech-to-text service does with a job.
#[derive(Debug, Clone)]
pub enum ScriptedTranscript {
    /// Completes on the first poll; words are 400 ms apart.
    Completes(String),
    /// Stays `processing` forever.
    NeverCompletes,
    /// Reports a terminal job error.
    Errors(String),
}

pub struct ScriptedTranscription {
    script: Mutex<ScriptedTranscript>,
    pub submitted: Mutex<Vec<String>>,
    pub polls: AtomicU32,
}

#[async_trait]
impl TranscriptionCapability for ScriptedTranscription {
    async fn submit(&self, media_url: &str) -> Result<String, CapabilityError> {
        self.submitted.lock().unwrap().push(media_url.to_string());
        Ok("job-1".to_string())
    }

    async fn status(&self, _job_id: &str) -> Result<TranscriptionJob, CapabilityError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap().clone();
        Ok(match script {
            ScriptedTranscript::Completes(text) => TranscriptionJob {
                words: timed_words(&text),
                text: Some(text),
                duration_secs: Some(12.5),
                ..TranscriptionJob::in_progress(JobState::Completed)
            },
            ScriptedTranscript::NeverCompletes => {
                TranscriptionJob::in_progress(JobState::Processing)
            }
            ScriptedTranscript::Errors(message) => TranscriptionJob {
                error: Some(message),
                ..TranscriptionJob::in_progress(JobState::Error)
            },
        })
    }
}

fn timed_words(text: &str) -> Vec<TranscriptWord> {
    text.split_whitespace()
        .enumerate()
        .map(|(i, w)| TranscriptWord {
            text: w.to_string(),
            start_ms: 400 * i as u64,
            end_ms: 400 * i as u64 + 350,
            confidence: 0.93,
        })
        .collect()
}

pub struct ScriptedLanguage {
    reply: Mutex<String>,
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LanguageCapability for ScriptedLanguage {
    async fn complete(&self, prompt: &str) -> Result<String, CapabilityError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.lock().unwrap().clone())
    }
}

/// Test harness providing an isolated environment for pipeline runs.
pub struct TestHarness {
    temp_dir: TempDir,
    files: FilesystemStore,
    pub repo: Arc<SqliteAssetRepository>,
    pub vision: Arc<ScriptedVision>,
    pub transcription: Arc<ScriptedTranscription>,
    pub language: Arc<ScriptedLanguage>,
    pub config: PipelineConfig,
}

impl TestHarness {
    /// Defaults: a clean vision reply, no transcript ever, a passing
    /// compliance reply, and a 1 ms poll interval with 3 attempts.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let files = FilesystemStore::new(temp_dir.path(), PUBLIC_BASE_URL);
        let repo = Arc::new(SqliteAssetRepository::new(
            Database::open_in_memory().expect("Failed to open database"),
        ));

        Self {
            temp_dir,
            files,
            repo,
            vision: Arc::new(ScriptedVision {
                reply: Mutex::new(Ok(super::VisionReply::clean().build())),
                calls: AtomicU32::new(0),
            }),
            transcription: Arc::new(ScriptedTranscription {
                script: Mutex::new(ScriptedTranscript::NeverCompletes),
                submitted: Mutex::new(Vec::new()),
                polls: AtomicU32::new(0),
            }),
            language: Arc::new(ScriptedLanguage {
                reply: Mutex::new(super::ComplianceReply::new("pass", "All clear.").build()),
                prompts: Mutex::new(Vec::new()),
            }),
            config: PipelineConfig {
                poll_interval: Duration::from_millis(1),
                max_poll_attempts: 3,
                ..Default::default()
            },
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn set_vision_reply(&self, reply: &str) {
        *self.vision.reply.lock().unwrap() = Ok(reply.to_string());
    }

    pub fn fail_vision(&self, message: &str) {
        *self.vision.reply.lock().unwrap() = Err(message.to_string());
    }

    pub fn set_transcript(&self, script: ScriptedTranscript) {
        *self.transcription.script.lock().unwrap() = script;
    }

    pub fn set_language_reply(&self, reply: &str) {
        *self.language.reply.lock().unwrap() = reply.to_string();
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.language.prompts.lock().unwrap().last().cloned()
    }

    pub fn services(&self) -> PipelineServices {
        PipelineServices {
            repo: self.repo.clone(),
            store: Arc::new(FilesystemStore::new(self.temp_path(), PUBLIC_BASE_URL)),
            vision: self.vision.clone(),
            transcription: self.transcription.clone(),
            language: self.language.clone(),
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(&self.config, self.services())
    }

    /// Writes `content` into the store without registering an asset.
    pub fn put_object(&self, storage_path: &str, content: &[u8]) {
        self.files
            .put(storage_path, content)
            .expect("Failed to write object");
    }

    /// Stores the object and inserts a `pending` asset for it.
    pub fn add_asset(&self, asset_id: &str, display_name: &str, mime_type: &str) -> CreativeAsset {
        let storage_path = format!("campaign-1/{}", display_name);
        self.put_object(&storage_path, format!("bytes of {}", display_name).as_bytes());
        self.insert_asset(asset_id, &storage_path, display_name, mime_type)
    }

    /// Inserts a `pending` asset without writing any object.
    pub fn insert_asset(
        &self,
        asset_id: &str,
        storage_path: &str,
        display_name: &str,
        mime_type: &str,
    ) -> CreativeAsset {
        let asset = CreativeAsset::new_pending(
            asset_id.to_string(),
            "campaign-1".to_string(),
            "brand-1".to_string(),
            storage_path.to_string(),
            mime_type.to_string(),
            display_name.to_string(),
        );
        self.repo.insert(&asset).expect("Failed to insert asset");
        asset
    }

    pub fn upsert_brand(&self, brand: &BrandConfig) {
        self.repo.upsert_brand(brand).expect("Failed to store brand");
    }

    pub fn find(&self, asset_id: &str) -> CreativeAsset {
        self.repo
            .find(asset_id)
            .expect("Failed to load asset")
            .expect("Asset not found")
    }

    pub async fn run(&self, asset_id: &str) -> RunOutcome {
        self.run_with(asset_id, &NoopProgress, &CancellationToken::new())
            .await
    }

    pub async fn run_with(
        &self,
        asset_id: &str,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        self.pipeline().run(asset_id, progress, cancel).await
    }
}
