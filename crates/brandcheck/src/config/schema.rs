use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capability::HttpTimeouts;
use crate::model::CreativeType;
use crate::secrets::SecretSource;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite file; defaults to `~/.brandcheck/data/brandcheck.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// How often pending assets are swept back onto the queue.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub log_format: LogFormat,
    pub storage: StorageConfig,
    pub vision: ChatProviderConfig,
    pub transcription: TranscriptionConfig,
    pub language: ChatProviderConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub compliance: ComplianceConfig,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_queue_capacity() -> usize {
    256
}

fn default_sweep_interval_secs() -> u64 {
    30
}

impl Config {
    pub fn database_path(&self) -> Option<PathBuf> {
        match self.database_path.as_deref() {
            Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
            _ => crate::db::default_database_path(),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where asset bytes live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    Filesystem {
        root: String,
        public_base_url: String,
    },
    Http {
        base_url: String,
        bucket: String,
        #[serde(default)]
        credentials: SecretSource,
        #[serde(default)]
        timeouts: TimeoutConfig,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn to_http_timeouts(self) -> HttpTimeouts {
        HttpTimeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            request: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// An OpenAI-compatible chat completions provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatProviderConfig {
    pub endpoint: String,
    pub model: String,
    #[serde(default)]
    pub credentials: SecretSource,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

fn default_max_tokens() -> u32 {
    1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_transcription_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub credentials: SecretSource,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

fn default_transcription_endpoint() -> String {
    "https://api.assemblyai.com".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_poll_attempts() -> u32 {
    60
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Returned when no frame could be analyzed.
    #[serde(default = "default_creative_type")]
    pub default_creative_type: CreativeType,
    #[serde(default = "default_confidence")]
    pub default_confidence: f64,
}

fn default_creative_type() -> CreativeType {
    CreativeType::Ugc
}

fn default_confidence() -> f64 {
    0.7
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            default_creative_type: default_creative_type(),
            default_confidence: default_confidence(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ComplianceConfig {
    /// Mispronunciation citations at or below this confidence are dropped.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_max_transcript_chars")]
    pub max_transcript_chars: usize,
}

fn default_confidence_threshold() -> f64 {
    crate::stages::compliance::DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_max_transcript_chars() -> usize {
    crate::stages::compliance::DEFAULT_MAX_TRANSCRIPT_CHARS
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            max_transcript_chars: default_max_transcript_chars(),
        }
    }
}
