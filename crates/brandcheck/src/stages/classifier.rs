//! UGC vs. produced classification from per-frame indicator votes.

use crate::model::{Classification, CreativeType, UgcIndicators};

const HANDHELD_WEIGHT: f64 = 0.25;
const CASUAL_SETTING_WEIGHT: f64 = 0.25;
const AUTHENTIC_FEEL_WEIGHT: f64 = 0.25;
const PROFESSIONAL_LIGHTING_WEIGHT: f64 = -0.15;
const STUDIO_SETUP_WEIGHT: f64 = -0.25;

/// Classifies a creative from the indicators of its analyzed frames.
#[derive(Debug, Clone)]
pub struct AuthenticityClassifier {
    default_type: CreativeType,
    default_confidence: f64,
}

impl AuthenticityClassifier {
    /// `default_*` are returned when no frame could be analyzed.
    pub fn new(default_type: CreativeType, default_confidence: f64) -> Self {
        Self {
            default_type,
            default_confidence: default_confidence.clamp(0.0, 1.0),
        }
    }

    pub fn classify(&self, frames: &[UgcIndicators]) -> Classification {
        if frames.is_empty() {
            return Classification {
                creative_type: self.default_type,
                confidence: self.default_confidence,
                ugc_votes: 0,
                frames_analyzed: 0,
                frame_scores: Vec::new(),
                defaulted: true,
            };
        }

        let frame_scores: Vec<f64> = frames.iter().map(frame_score).collect();
        let ugc_votes = frame_scores.iter().filter(|s| **s > 0.5).count();
        let total = frame_scores.len();

        let creative_type = if ugc_votes as f64 / total as f64 > 0.5 {
            CreativeType::Ugc
        } else {
            CreativeType::Produced
        };
        let confidence = frame_scores.iter().sum::<f64>() / total as f64;

        Classification {
            creative_type,
            confidence,
            ugc_votes: ugc_votes as u32,
            frames_analyzed: total as u32,
            frame_scores,
            defaulted: false,
        }
    }
}

impl Default for AuthenticityClassifier {
    fn default() -> Self {
        Self::new(CreativeType::Ugc, 0.7)
    }
}

/// Signed indicator sum shifted by 0.5 and clamped into [0, 1].
pub fn frame_score(indicators: &UgcIndicators) -> f64 {
    let weighted = [
        (indicators.handheld, HANDHELD_WEIGHT),
        (indicators.casual_setting, CASUAL_SETTING_WEIGHT),
        (indicators.authentic_feel, AUTHENTIC_FEEL_WEIGHT),
        (indicators.professional_lighting, PROFESSIONAL_LIGHTING_WEIGHT),
        (indicators.studio_setup, STUDIO_SETUP_WEIGHT),
    ];
    let sum: f64 = weighted
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, weight)| weight)
        .sum();
    (sum + 0.5).clamp(0.0, 1.0)
}
