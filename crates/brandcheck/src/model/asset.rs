//! The creative asset record and its lifecycle status.

use serde::{Deserialize, Serialize};

use super::report::{ReportEntry, Verdict};
use super::stage::{Classification, ComplianceResult, CreativeType, DetailedResults, Transcript};

/// Lifecycle status of an asset run.
///
/// `Failed` is not terminal: requeue moves it back to `Pending` and the
/// orchestrator treats it like a fresh asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Pending => "pending",
            AssetStatus::Processing => "processing",
            AssetStatus::Completed => "completed",
            AssetStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(AssetStatus::Pending),
            "processing" => Some(AssetStatus::Processing),
            "completed" => Some(AssetStatus::Completed),
            "failed" => Some(AssetStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse media family derived from the MIME type; decides which stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Other,
}

impl MediaKind {
    pub fn from_mime(mime_type: &str) -> Self {
        let family = mime_type
            .split('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match family.as_str() {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            "audio" => MediaKind::Audio,
            _ => MediaKind::Other,
        }
    }

    /// Whether the asset carries a soundtrack worth transcribing.
    pub fn has_audio(&self) -> bool {
        matches!(self, MediaKind::Audio | MediaKind::Video)
    }
}

/// Snapshot of the physical file taken right after download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProperties {
    pub file_size: u64,
    pub mime_type: String,
    pub display_name: String,
}

/// Records which stage made a run fail and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub stage: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(stage: &str, message: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            message: message.into(),
        }
    }
}

/// One uploaded creative and everything the pipeline learned about it.
#[derive(Debug, Clone, PartialEq)]
pub struct CreativeAsset {
    /// Unique asset identifier.
    pub asset_id: String,
    pub campaign_id: String,
    /// Brand whose vocabulary rules apply to this asset.
    pub brand_id: String,
    pub organization_id: Option<String>,
    /// Path of the object inside the asset store.
    pub storage_path: String,
    pub mime_type: String,
    /// Size in bytes, known once the asset has been downloaded.
    pub file_size: Option<u64>,
    pub display_name: String,
    pub status: AssetStatus,

    pub source_properties: Option<SourceProperties>,
    pub ugc_detection_data: Option<Classification>,
    pub creative_type: Option<CreativeType>,
    pub raw_transcript: Option<Transcript>,
    pub vocabulary_compliance_result: Option<ComplianceResult>,

    pub detailed_results: Option<DetailedResults>,
    pub frontend_report: Option<Vec<ReportEntry>>,
    pub overall_status: Option<Verdict>,
    pub compliance_score: Option<u8>,

    pub error_detail: Option<ErrorDetail>,
    /// How many times the asset has entered `processing`.
    pub attempts: u32,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl CreativeAsset {
    /// Creates a fresh `pending` asset with no stage output.
    pub fn new_pending(
        asset_id: String,
        campaign_id: String,
        brand_id: String,
        storage_path: String,
        mime_type: String,
        display_name: String,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            asset_id,
            campaign_id,
            brand_id,
            organization_id: None,
            storage_path,
            mime_type,
            file_size: None,
            display_name,
            status: AssetStatus::Pending,
            source_properties: None,
            ugc_detection_data: None,
            creative_type: None,
            raw_transcript: None,
            vocabulary_compliance_result: None,
            detailed_results: None,
            frontend_report: None,
            overall_status: None,
            compliance_score: None,
            error_detail: None,
            attempts: 0,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        MediaKind::from_mime(&self.mime_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            AssetStatus::Pending,
            AssetStatus::Processing,
            AssetStatus::Completed,
            AssetStatus::Failed,
        ] {
            assert_eq!(AssetStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AssetStatus::parse("superseded"), None);
    }

    #[test]
    fn test_media_kind_from_mime() {
        assert_eq!(MediaKind::from_mime("image/png"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_mime("audio/mpeg"), MediaKind::Audio);
        assert_eq!(MediaKind::from_mime("IMAGE/JPEG"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("application/pdf"), MediaKind::Other);
        assert_eq!(MediaKind::from_mime(""), MediaKind::Other);
    }

    #[test]
    fn test_only_audio_and_video_have_audio() {
        assert!(MediaKind::Audio.has_audio());
        assert!(MediaKind::Video.has_audio());
        assert!(!MediaKind::Image.has_audio());
        assert!(!MediaKind::Other.has_audio());
    }

    #[test]
    fn test_new_pending_asset_is_empty() {
        let asset = CreativeAsset::new_pending(
            "a1".to_string(),
            "c1".to_string(),
            "b1".to_string(),
            "uploads/a1.png".to_string(),
            "image/png".to_string(),
            "a1.png".to_string(),
        );
        assert_eq!(asset.status, AssetStatus::Pending);
        assert_eq!(asset.attempts, 0);
        assert!(asset.frontend_report.is_none());
        assert!(asset.error_detail.is_none());
        assert_eq!(asset.media_kind(), MediaKind::Image);
    }
}
