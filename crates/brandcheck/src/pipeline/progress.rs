use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::Verdict;

/// Phase of an asset run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssetPhase {
    Downloading,
    Analyzing,
    CheckingVocabulary,
    Aggregating,
    Saving,
    Completed,
    Failed,
}

impl std::fmt::Display for AssetPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetPhase::Downloading => write!(f, "Downloading"),
            AssetPhase::Analyzing => write!(f, "Analyzing"),
            AssetPhase::CheckingVocabulary => write!(f, "Checking vocabulary"),
            AssetPhase::Aggregating => write!(f, "Aggregating"),
            AssetPhase::Saving => write!(f, "Saving"),
            AssetPhase::Completed => write!(f, "Completed"),
            AssetPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Events emitted by the pipeline during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Phase {
        phase: AssetPhase,
        message: String,
    },
    Completed {
        overall_status: Verdict,
        compliance_score: u8,
    },
    Failed {
        stage: String,
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests and the CLI.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Progress of one asset as sent to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetProgressEvent {
    pub asset_id: String,
    pub phase: AssetPhase,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_status: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssetProgressEvent {
    fn new(asset_id: &str, phase: AssetPhase, message: String) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            phase,
            message,
            timestamp: Utc::now(),
            overall_status: None,
            compliance_score: None,
            error: None,
        }
    }
}

/// Bridges pipeline events for one asset onto a broadcast channel.
pub struct BroadcastProgress {
    asset_id: String,
    sender: broadcast::Sender<AssetProgressEvent>,
}

impl BroadcastProgress {
    pub fn new(asset_id: &str, sender: broadcast::Sender<AssetProgressEvent>) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            sender,
        }
    }

    fn send(&self, event: AssetProgressEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        let event = match event {
            ProgressEvent::Phase { phase, message } => {
                AssetProgressEvent::new(&self.asset_id, phase, message)
            }
            ProgressEvent::Completed {
                overall_status,
                compliance_score,
            } => AssetProgressEvent {
                overall_status: Some(overall_status),
                compliance_score: Some(compliance_score),
                ..AssetProgressEvent::new(
                    &self.asset_id,
                    AssetPhase::Completed,
                    format!("Completed with {} ({}%)", overall_status, compliance_score),
                )
            },
            ProgressEvent::Failed { stage, error } => AssetProgressEvent {
                error: Some(error.clone()),
                ..AssetProgressEvent::new(
                    &self.asset_id,
                    AssetPhase::Failed,
                    format!("Failed during {}: {}", stage, error),
                )
            },
        };
        self.send(event);
    }
}
