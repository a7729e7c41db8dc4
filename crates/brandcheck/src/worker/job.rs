use std::path::Path;

use crate::model::CreativeAsset;
use crate::pipeline::RunOutcome;

/// Why a job was put on the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOrigin {
    Enqueued,
    Requeued,
    /// Resubmitted by the periodic pending sweep.
    Sweep,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetJob {
    pub asset_id: String,
    pub origin: JobOrigin,
}

impl AssetJob {
    pub fn new(asset_id: impl Into<String>, origin: JobOrigin) -> Self {
        Self {
            asset_id: asset_id.into(),
            origin,
        }
    }
}

#[derive(Debug)]
pub struct AssetJobResult {
    pub asset_id: String,
    pub outcome: RunOutcome,
}

/// A new asset handed to the system by an uploader.
#[derive(Debug, Clone, Default)]
pub struct EnqueueRequest {
    /// Generated when absent.
    pub asset_id: Option<String>,
    pub storage_path: String,
    pub campaign_id: String,
    pub brand_id: String,
    pub organization_id: Option<String>,
    /// Guessed from the display name, then the storage path, when absent.
    pub mime_type: Option<String>,
    pub display_name: String,
}

impl EnqueueRequest {
    /// Builds the `pending` asset row for this request.
    pub fn into_asset(self) -> CreativeAsset {
        let mime_type = self
            .mime_type
            .filter(|m| !m.trim().is_empty())
            .or_else(|| detect_mime_type(Path::new(&self.display_name)))
            .or_else(|| detect_mime_type(Path::new(&self.storage_path)))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut asset = CreativeAsset::new_pending(
            self.asset_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            self.campaign_id,
            self.brand_id,
            self.storage_path,
            mime_type,
            self.display_name,
        );
        asset.organization_id = self.organization_id;
        asset
    }
}

/// Detects MIME type from a file name using the mime_guess crate.
/// Returns `None` for unknown extensions.
fn detect_mime_type(path: &Path) -> Option<String> {
    mime_guess::from_path(path).first().map(|m| m.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetStatus, MediaKind};

    fn request() -> EnqueueRequest {
        EnqueueRequest {
            storage_path: "campaign-1/upload-7".to_string(),
            campaign_id: "campaign-1".to_string(),
            brand_id: "brand-1".to_string(),
            display_name: "spring-hero.mp4".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_into_asset_generates_id_and_guesses_mime() {
        let asset = request().into_asset();
        assert!(!asset.asset_id.is_empty());
        assert_eq!(asset.status, AssetStatus::Pending);
        assert_eq!(asset.mime_type, "video/mp4");
        assert_eq!(asset.media_kind(), MediaKind::Video);
        assert!(asset.organization_id.is_none());
    }

    #[test]
    fn test_explicit_values_win() {
        let asset = EnqueueRequest {
            asset_id: Some("a-1".to_string()),
            mime_type: Some("audio/mpeg".to_string()),
            organization_id: Some("org-1".to_string()),
            ..request()
        }
        .into_asset();
        assert_eq!(asset.asset_id, "a-1");
        assert_eq!(asset.mime_type, "audio/mpeg");
        assert_eq!(asset.organization_id.as_deref(), Some("org-1"));
    }

    #[test]
    fn test_mime_falls_back_to_storage_path() {
        let asset = EnqueueRequest {
            storage_path: "campaign-1/banner.png".to_string(),
            display_name: "Banner".to_string(),
            ..request()
        }
        .into_asset();
        assert_eq!(asset.mime_type, "image/png");

        let asset = EnqueueRequest {
            display_name: "Banner".to_string(),
            ..request()
        }
        .into_asset();
        assert_eq!(asset.mime_type, "application/octet-stream");
        assert_eq!(asset.media_kind(), MediaKind::Other);
    }
}
