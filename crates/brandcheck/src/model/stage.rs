//! Structured outputs of the analysis stages.
//!
//! These types are what gets persisted (as JSON) into the asset row, so
//! their serialized shape is part of the storage format.

use serde::{Deserialize, Serialize};

use super::asset::SourceProperties;
use super::report::Verdict;

/// Result of one stage inside `detailed_results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome<T> {
    Completed { output: T },
    Failed { error: String },
    Skipped { reason: String },
}

impl<T> StageOutcome<T> {
    pub fn output(&self) -> Option<&T> {
        match self {
            StageOutcome::Completed { output } => Some(output),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed { .. })
    }

    pub fn skipped(reason: &str) -> Self {
        StageOutcome::Skipped {
            reason: reason.to_string(),
        }
    }
}

/// Brand elements detected in a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandElements {
    pub logo_visible: bool,
    pub brand_colors_present: bool,
    pub product_visible: bool,
}

/// Production-style cues used by the authenticity classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UgcIndicators {
    pub handheld: bool,
    pub casual_setting: bool,
    pub authentic_feel: bool,
    pub professional_lighting: bool,
    pub studio_setup: bool,
}

/// All boolean indicators extracted from a vision response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameIndicators {
    pub brand: BrandElements,
    pub ugc: UgcIndicators,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub frame_index: u32,
    pub description: String,
    pub logos: Vec<String>,
    pub text: Vec<String>,
    pub dominant_colors: Vec<String>,
    pub objects: Vec<String>,
    pub person_count: u32,
    pub scene_tags: Vec<String>,
    pub indicators: FrameIndicators,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreativeType {
    #[serde(rename = "UGC")]
    Ugc,
    #[serde(rename = "Produced")]
    Produced,
}

impl CreativeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreativeType::Ugc => "UGC",
            CreativeType::Produced => "Produced",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ugc" => Some(CreativeType::Ugc),
            "produced" => Some(CreativeType::Produced),
            _ => None,
        }
    }
}

impl std::fmt::Display for CreativeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticity classification, persisted as `ugc_detection_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub creative_type: CreativeType,
    pub confidence: f64,
    pub ugc_votes: u32,
    pub frames_analyzed: u32,
    /// Normalized score of every analyzed frame, in frame order.
    pub frame_scores: Vec<f64>,
    /// True when no frame was analyzed and the configured prior was used.
    pub defaulted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Identifier of the transcription job that produced this text.
    pub job_id: String,
    pub text: String,
    pub words: Vec<TranscriptWord>,
    pub duration_secs: Option<f64>,
}

impl Transcript {
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationKind {
    BannedWord,
    Mispronunciation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(rename = "type")]
    pub kind: CitationKind,
    pub spoken_text: String,
    pub timestamp_ms: u64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub status: Verdict,
    pub notes: String,
    pub citations: Vec<Citation>,
}

/// Vocabulary rules for one brand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandConfig {
    pub brand_id: String,
    pub brand_name: String,
    pub phonetic_pronunciation: Option<String>,
    pub banned_terms: Vec<String>,
}

impl BrandConfig {
    /// Placeholder used when an asset references a brand with no stored rules.
    pub fn unknown(brand_id: &str) -> Self {
        Self {
            brand_id: brand_id.to_string(),
            brand_name: "Unknown brand".to_string(),
            phonetic_pronunciation: None,
            banned_terms: Vec::new(),
        }
    }
}

/// Full structured output of every stage, kept for audit and debugging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedResults {
    pub source_properties: Option<SourceProperties>,
    pub visual: StageOutcome<Vec<FrameAnalysis>>,
    pub classification: Classification,
    pub transcription: StageOutcome<Transcript>,
    pub compliance: StageOutcome<ComplianceResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_outcome_serializes_with_status_tag() {
        let outcome: StageOutcome<Vec<u32>> = StageOutcome::Completed { output: vec![1] };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["output"][0], 1);

        let failed: StageOutcome<Vec<u32>> = StageOutcome::Failed {
            error: "boom".to_string(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "boom");
    }

    #[test]
    fn test_citation_uses_type_key() {
        let citation = Citation {
            kind: CitationKind::BannedWord,
            spoken_text: "cheap".to_string(),
            timestamp_ms: 1500,
            confidence: 0.9,
        };
        let json = serde_json::to_value(&citation).unwrap();
        assert_eq!(json["type"], "banned_word");

        let parsed: Citation = serde_json::from_value(serde_json::json!({
            "type": "mispronunciation",
            "spoken_text": "Nikey",
            "timestamp_ms": 200,
            "confidence": 0.95
        }))
        .unwrap();
        assert_eq!(parsed.kind, CitationKind::Mispronunciation);
    }

    #[test]
    fn test_creative_type_serialized_names() {
        assert_eq!(serde_json::to_value(CreativeType::Ugc).unwrap(), "UGC");
        assert_eq!(
            serde_json::to_value(CreativeType::Produced).unwrap(),
            "Produced"
        );
        assert_eq!(CreativeType::parse("ugc"), Some(CreativeType::Ugc));
        assert_eq!(CreativeType::parse("other"), None);
    }

    #[test]
    fn test_transcript_has_text_ignores_whitespace() {
        let transcript = Transcript {
            job_id: "t1".to_string(),
            text: "  \n".to_string(),
            words: vec![],
            duration_secs: None,
        };
        assert!(!transcript.has_text());
    }
}
