use std::time::Duration;

use crate::config::Config;
use crate::model::CreativeType;
use crate::stages::compliance::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_MAX_TRANSCRIPT_CHARS};
use crate::stages::transcription::{DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};

/// Tunables for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub default_creative_type: CreativeType,
    pub default_confidence: f64,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub confidence_threshold: f64,
    pub max_transcript_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_creative_type: CreativeType::Ugc,
            default_confidence: 0.7,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            max_transcript_chars: DEFAULT_MAX_TRANSCRIPT_CHARS,
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_creative_type: config.classifier.default_creative_type,
            default_confidence: config.classifier.default_confidence,
            poll_interval: Duration::from_secs(config.transcription.poll_interval_secs),
            max_poll_attempts: config.transcription.max_poll_attempts,
            confidence_threshold: config.compliance.confidence_threshold,
            max_transcript_chars: config.compliance.max_transcript_chars,
        }
    }
}
