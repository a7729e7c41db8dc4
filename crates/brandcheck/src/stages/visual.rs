//! Visual analysis of image assets and video frames.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use super::StageError;
use crate::capability::VisionCapability;
use crate::model::{FrameAnalysis, FrameIndicators, StageOutcome};

/// Instructions sent with every frame. One `Label: value` line per field.
pub const VISUAL_INSTRUCTIONS: &str = r#"You are reviewing a marketing creative for brand compliance.
Answer with exactly one line per field below, in the form `Label: value`, and nothing else.

Description: one or two sentences describing the image
Logos: comma-separated brand logos you can see, or none
Text: comma-separated visible text snippets, or none
Colors: comma-separated dominant colors
Objects: comma-separated notable objects
People: number of people visible
Scene: comma-separated scene tags (e.g. indoor, kitchen, beach)
Logo visible: yes or no
Brand colors present: yes or no
Product visible: yes or no
Handheld: yes or no (shot handheld or as a selfie)
Casual setting: yes or no
Authentic feel: yes or no (candid, unscripted)
Professional lighting: yes or no
Studio setup: yes or no"#;

/// A single still taken from an asset.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u32,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Source of still frames for video assets.
pub trait FrameExtractor: Send + Sync {
    fn extract(&self, video: &[u8], mime_type: &str) -> Vec<Frame>;
}

/// Extracts nothing; videos are classified from the configured prior.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFrameExtractor;

impl FrameExtractor for NoFrameExtractor {
    fn extract(&self, _video: &[u8], _mime_type: &str) -> Vec<Frame> {
        Vec::new()
    }
}

/// Derives the brand and UGC booleans from a vision response.
pub trait IndicatorExtractor: Send + Sync {
    fn extract(&self, response: &str) -> FrameIndicators;
}

static RE_LOGO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(logos?|brand ?mark|wordmark)\b").unwrap());
static RE_BRAND_COLORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bbrand(ed)? colou?rs?\b").unwrap());
static RE_PRODUCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(products?|packaging|package)\b").unwrap());
static RE_HANDHELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(hand-?held|selfie|shaky)\b").unwrap());
static RE_CASUAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(casual|at home|kitchen|bedroom|living room|everyday)\b").unwrap()
});
static RE_AUTHENTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(authentic|candid|genuine|unscripted|unpolished)\b").unwrap()
});
static RE_PRO_LIGHTING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(professional(ly)? lit|professional lighting|studio lighting|softbox)\b")
        .unwrap()
});
static RE_STUDIO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(studio|backdrop|seamless background)\b").unwrap());

/// Words that cancel a keyword when they appear shortly before it.
const NEGATIONS: &[&str] = &["no", "not", "without", "never", "nor", "lacks", "lacking"];

/// How many words before a keyword are checked for a negation.
const NEGATION_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy)]
enum Indicator {
    LogoVisible,
    BrandColorsPresent,
    ProductVisible,
    Handheld,
    CasualSetting,
    AuthenticFeel,
    ProfessionalLighting,
    StudioSetup,
}

impl Indicator {
    const ALL: [Indicator; 8] = [
        Indicator::LogoVisible,
        Indicator::BrandColorsPresent,
        Indicator::ProductVisible,
        Indicator::Handheld,
        Indicator::CasualSetting,
        Indicator::AuthenticFeel,
        Indicator::ProfessionalLighting,
        Indicator::StudioSetup,
    ];

    fn label(self) -> &'static str {
        match self {
            Indicator::LogoVisible => "logo visible",
            Indicator::BrandColorsPresent => "brand colors present",
            Indicator::ProductVisible => "product visible",
            Indicator::Handheld => "handheld",
            Indicator::CasualSetting => "casual setting",
            Indicator::AuthenticFeel => "authentic feel",
            Indicator::ProfessionalLighting => "professional lighting",
            Indicator::StudioSetup => "studio setup",
        }
    }

    fn keywords(self) -> &'static Regex {
        match self {
            Indicator::LogoVisible => &RE_LOGO,
            Indicator::BrandColorsPresent => &RE_BRAND_COLORS,
            Indicator::ProductVisible => &RE_PRODUCT,
            Indicator::Handheld => &RE_HANDHELD,
            Indicator::CasualSetting => &RE_CASUAL,
            Indicator::AuthenticFeel => &RE_AUTHENTIC,
            Indicator::ProfessionalLighting => &RE_PRO_LIGHTING,
            Indicator::StudioSetup => &RE_STUDIO,
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.label() == label)
    }

    fn set(self, indicators: &mut FrameIndicators, value: bool) {
        match self {
            Indicator::LogoVisible => indicators.brand.logo_visible = value,
            Indicator::BrandColorsPresent => indicators.brand.brand_colors_present = value,
            Indicator::ProductVisible => indicators.brand.product_visible = value,
            Indicator::Handheld => indicators.ugc.handheld = value,
            Indicator::CasualSetting => indicators.ugc.casual_setting = value,
            Indicator::AuthenticFeel => indicators.ugc.authentic_feel = value,
            Indicator::ProfessionalLighting => indicators.ugc.professional_lighting = value,
            Indicator::StudioSetup => indicators.ugc.studio_setup = value,
        }
    }
}

/// Honours explicit `Label: yes/no` lines, then falls back to keyword
/// matching over the rest of the response.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordIndicatorExtractor;

impl IndicatorExtractor for KeywordIndicatorExtractor {
    fn extract(&self, response: &str) -> FrameIndicators {
        let mut indicators = FrameIndicators::default();
        let mut explicit = [None; 8];
        let mut listed_logos = false;
        let mut free_text = String::new();

        for line in response.lines() {
            let scanned = match split_label(line) {
                Some((label, value)) => {
                    if let Some(indicator) = Indicator::from_label(&label) {
                        explicit[indicator as usize] = parse_yes_no(value);
                        continue;
                    }
                    if label == "logos" {
                        listed_logos = !parse_list(value).is_empty();
                    }
                    // Structured fields contribute their values, never their labels.
                    field_scan_text(&label, value).unwrap_or_else(|| line.to_string())
                }
                None => line.to_string(),
            };
            free_text.push_str(&scanned);
            free_text.push('\n');
        }

        for indicator in Indicator::ALL {
            let value = explicit[indicator as usize].unwrap_or_else(|| {
                mentions(indicator.keywords(), &free_text)
                    || matches!(indicator, Indicator::LogoVisible) && listed_logos
            });
            indicator.set(&mut indicators, value);
        }

        indicators
    }
}

/// Text of a structured field to scan for keywords; `None` when `label` is
/// not one of the fields the instructions ask for.
fn field_scan_text(label: &str, value: &str) -> Option<String> {
    match label {
        "description" => Some(value.to_string()),
        "logos" | "text" | "colors" | "colours" | "dominant colors" | "objects" | "scene"
        | "scene tags" => Some(parse_list(value).join(", ")),
        "people" | "person count" => Some(String::new()),
        _ => None,
    }
}

/// True when `keywords` matches somewhere in `text` without a negation in
/// the few words before it.
fn mentions(keywords: &Regex, text: &str) -> bool {
    keywords
        .find_iter(text)
        .any(|m| !is_negated(&text[..m.start()]))
}

fn is_negated(before: &str) -> bool {
    let clause = before
        .rsplit(['.', ',', ';', ':', '!', '?', '\n'])
        .next()
        .unwrap_or(before);
    clause
        .split_whitespace()
        .rev()
        .take(NEGATION_WINDOW)
        .map(|w| {
            w.trim_matches(|c: char| !c.is_ascii_alphabetic() && c != '\'')
                .to_ascii_lowercase()
        })
        .any(|w| NEGATIONS.contains(&w.as_str()) || w.ends_with("n't"))
}

/// Splits `Label: value`, normalizing markdown emphasis and case in the label.
fn split_label(line: &str) -> Option<(String, &str)> {
    let (label, value) = line.split_once(':')?;
    let label = label
        .trim()
        .trim_start_matches(['-', '#', ' '])
        .replace('*', "")
        .replace('_', " ")
        .trim()
        .to_lowercase();
    if label.is_empty() {
        return None;
    }
    Some((label, value.trim().trim_matches('*').trim()))
}

fn parse_yes_no(value: &str) -> Option<bool> {
    let word = value
        .split(|c: char| !c.is_ascii_alphabetic())
        .find(|w| !w.is_empty())?
        .to_ascii_lowercase();
    match word.as_str() {
        "yes" | "true" | "y" => Some(true),
        "no" | "false" | "n" | "none" => Some(false),
        _ => None,
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(|item| item.trim().trim_end_matches('.').trim())
        .filter(|item| {
            !item.is_empty() && !matches!(item.to_ascii_lowercase().as_str(), "none" | "n/a" | "-")
        })
        .map(str::to_string)
        .collect()
}

fn parse_count(value: &str) -> u32 {
    value
        .split(|c: char| !c.is_ascii_digit())
        .find(|d| !d.is_empty())
        .and_then(|d| d.parse().ok())
        .unwrap_or(0)
}

/// Parses a vision response into a frame analysis.
pub fn parse_frame_analysis(
    response: &str,
    frame_index: u32,
    extractor: &dyn IndicatorExtractor,
) -> FrameAnalysis {
    let mut analysis = FrameAnalysis {
        frame_index,
        indicators: extractor.extract(response),
        ..Default::default()
    };

    for line in response.lines() {
        let Some((label, value)) = split_label(line) else {
            continue;
        };
        match label.as_str() {
            "description" => analysis.description = value.to_string(),
            "logos" => analysis.logos = parse_list(value),
            "text" => analysis.text = parse_list(value),
            "colors" | "colours" | "dominant colors" => {
                analysis.dominant_colors = parse_list(value)
            }
            "objects" => analysis.objects = parse_list(value),
            "people" | "person count" => analysis.person_count = parse_count(value),
            "scene" | "scene tags" => analysis.scene_tags = parse_list(value),
            _ => {}
        }
    }

    if analysis.description.is_empty() {
        analysis.description = response.trim().to_string();
    }

    analysis
}

pub struct VisualAnalysisStage {
    vision: Arc<dyn VisionCapability>,
    extractor: Box<dyn IndicatorExtractor>,
}

impl VisualAnalysisStage {
    pub fn new(vision: Arc<dyn VisionCapability>) -> Self {
        Self::with_extractor(vision, Box::new(KeywordIndicatorExtractor))
    }

    pub fn with_extractor(
        vision: Arc<dyn VisionCapability>,
        extractor: Box<dyn IndicatorExtractor>,
    ) -> Self {
        Self { vision, extractor }
    }

    pub async fn analyze(
        &self,
        image: &[u8],
        mime_type: &str,
        frame_index: u32,
    ) -> Result<FrameAnalysis, StageError> {
        let response = self
            .vision
            .describe_image(image, mime_type, VISUAL_INSTRUCTIONS)
            .await?;

        if response.trim().is_empty() {
            return Err(StageError::EmptyResponse("vision capability"));
        }

        debug!(frame_index, chars = response.len(), "Vision response received");
        Ok(parse_frame_analysis(&response, frame_index, self.extractor.as_ref()))
    }

    /// Analyzes frames one by one. The outcome is completed when at least
    /// one frame succeeds, failed when all fail, skipped when there are none.
    pub async fn analyze_frames(&self, frames: &[Frame]) -> StageOutcome<Vec<FrameAnalysis>> {
        if frames.is_empty() {
            return StageOutcome::skipped("no frames to analyze");
        }

        let mut analyses = Vec::with_capacity(frames.len());
        let mut last_error = None;

        for frame in frames {
            match self.analyze(&frame.bytes, &frame.mime_type, frame.index).await {
                Ok(analysis) => analyses.push(analysis),
                Err(e) => {
                    warn!(frame_index = frame.index, error = %e, "Frame analysis failed");
                    last_error = Some(e.to_string());
                }
            }
        }

        match (analyses.is_empty(), last_error) {
            (true, Some(error)) => StageOutcome::Failed { error },
            _ => StageOutcome::Completed { output: analyses },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const STRUCTURED: &str = "Description: A person holding a can of Acme soda in a kitchen.
Logos: Acme
Text: Acme, Fresh Taste
Colors: red, white
Objects: soda can, counter
People: 1
Scene: indoor, kitchen
Logo visible: yes
Brand colors present: yes
Product visible: yes
Handheld: yes
Casual setting: yes
Authentic feel: yes
Professional lighting: no
Studio setup: no";

    struct ScriptedVision {
        replies: Mutex<Vec<Result<String, CapabilityError>>>,
    }

    impl ScriptedVision {
        fn new(replies: Vec<Result<String, CapabilityError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
            })
        }
    }

    #[async_trait]
    impl VisionCapability for ScriptedVision {
        async fn describe_image(
            &self,
            _image: &[u8],
            _mime_type: &str,
            _instructions: &str,
        ) -> Result<String, CapabilityError> {
            self.replies.lock().unwrap().remove(0)
        }
    }

    fn frame(index: u32) -> Frame {
        Frame {
            index,
            bytes: vec![0u8; 4],
            mime_type: "image/jpeg".to_string(),
        }
    }

    #[test]
    fn test_parse_structured_response() {
        let analysis = parse_frame_analysis(STRUCTURED, 0, &KeywordIndicatorExtractor);

        assert_eq!(
            analysis.description,
            "A person holding a can of Acme soda in a kitchen."
        );
        assert_eq!(analysis.logos, vec!["Acme"]);
        assert_eq!(analysis.text, vec!["Acme", "Fresh Taste"]);
        assert_eq!(analysis.dominant_colors, vec!["red", "white"]);
        assert_eq!(analysis.objects, vec!["soda can", "counter"]);
        assert_eq!(analysis.person_count, 1);
        assert_eq!(analysis.scene_tags, vec!["indoor", "kitchen"]);

        let ind = analysis.indicators;
        assert!(ind.brand.logo_visible);
        assert!(ind.brand.brand_colors_present);
        assert!(ind.brand.product_visible);
        assert!(ind.ugc.handheld);
        assert!(ind.ugc.casual_setting);
        assert!(ind.ugc.authentic_feel);
        assert!(!ind.ugc.professional_lighting);
        assert!(!ind.ugc.studio_setup);
    }

    #[test]
    fn test_markdown_labels_are_normalized() {
        let response = "- **Logo visible**: Yes.\n**Studio_setup**: no\nColors: none";
        let analysis = parse_frame_analysis(response, 2, &KeywordIndicatorExtractor);
        assert_eq!(analysis.frame_index, 2);
        assert!(analysis.indicators.brand.logo_visible);
        assert!(!analysis.indicators.ugc.studio_setup);
        assert!(analysis.dominant_colors.is_empty());
    }

    #[test]
    fn test_explicit_no_beats_keyword() {
        let response = "Description: Studio shot with a softbox and a logo.\nLogo visible: no";
        let ind = KeywordIndicatorExtractor.extract(response);
        assert!(!ind.brand.logo_visible);
        // No explicit line for these, so keywords decide.
        assert!(ind.ugc.studio_setup);
        assert!(ind.ugc.professional_lighting);
    }

    #[test]
    fn test_free_text_keyword_fallback() {
        let ind = KeywordIndicatorExtractor
            .extract("A shaky selfie video filmed at home in the kitchen, very candid.");
        assert!(ind.ugc.handheld);
        assert!(ind.ugc.casual_setting);
        assert!(ind.ugc.authentic_feel);
        assert!(!ind.ugc.studio_setup);
        assert!(!ind.brand.logo_visible);
    }

    #[test]
    fn test_everything_defaults_false() {
        let ind = KeywordIndicatorExtractor.extract("A blue sky.");
        assert_eq!(ind, FrameIndicators::default());

        let analysis = parse_frame_analysis("A blue sky.", 0, &KeywordIndicatorExtractor);
        assert_eq!(analysis.description, "A blue sky.");
        assert_eq!(analysis.person_count, 0);
    }

    #[test]
    fn test_field_labels_are_not_evidence() {
        let response =
            "Description: A blue sky over a field.\nLogos: none\nText: none\nColors: none";
        let analysis = parse_frame_analysis(response, 0, &KeywordIndicatorExtractor);
        assert!(analysis.logos.is_empty());
        assert_eq!(analysis.indicators, FrameIndicators::default());
    }

    #[test]
    fn test_listed_logo_counts_without_explicit_line() {
        let ind = KeywordIndicatorExtractor.extract("Description: A can on a table.\nLogos: Acme");
        assert!(ind.brand.logo_visible);
        assert!(!ind.brand.product_visible);
    }

    #[test]
    fn test_negated_keywords_are_ignored() {
        let ind = KeywordIndicatorExtractor
            .extract("There is no logo visible and no product in the shot.");
        assert!(!ind.brand.logo_visible);
        assert!(!ind.brand.product_visible);

        let ind = KeywordIndicatorExtractor
            .extract("Shot without a studio backdrop. The product sits on a desk.");
        assert!(!ind.ugc.studio_setup);
        assert!(ind.brand.product_visible);

        let ind = KeywordIndicatorExtractor.extract("It isn't candid, but a logo is visible.");
        assert!(!ind.ugc.authentic_feel);
        assert!(ind.brand.logo_visible);
    }

    #[test]
    fn test_parse_count_variants() {
        assert_eq!(parse_count("3"), 3);
        assert_eq!(parse_count("about 2 people"), 2);
        assert_eq!(parse_count("none"), 0);
    }

    #[tokio::test]
    async fn test_analyze_rejects_empty_response() {
        let stage = VisualAnalysisStage::new(ScriptedVision::new(vec![Ok("   ".to_string())]));
        let result = stage.analyze(b"img", "image/png", 0).await;
        assert!(matches!(result, Err(StageError::EmptyResponse(_))));
    }

    #[tokio::test]
    async fn test_analyze_propagates_capability_error() {
        let stage = VisualAnalysisStage::new(ScriptedVision::new(vec![Err(
            CapabilityError::Http("connection reset".to_string()),
        )]));
        let result = stage.analyze(b"img", "image/png", 0).await;
        assert!(matches!(result, Err(StageError::Capability(_))));
    }

    #[tokio::test]
    async fn test_analyze_frames_outcomes() {
        let stage = VisualAnalysisStage::new(ScriptedVision::new(vec![]));
        assert!(matches!(
            stage.analyze_frames(&[]).await,
            StageOutcome::Skipped { .. }
        ));

        let stage = VisualAnalysisStage::new(ScriptedVision::new(vec![
            Err(CapabilityError::Http("timeout".to_string())),
            Ok(STRUCTURED.to_string()),
        ]));
        match stage.analyze_frames(&[frame(0), frame(1)]).await {
            StageOutcome::Completed { output } => {
                assert_eq!(output.len(), 1);
                assert_eq!(output[0].frame_index, 1);
            }
            other => panic!("expected completed, got {:?}", other),
        }

        let stage = VisualAnalysisStage::new(ScriptedVision::new(vec![Err(
            CapabilityError::Http("timeout".to_string()),
        )]));
        assert!(stage.analyze_frames(&[frame(0)]).await.is_failed());
    }

    #[test]
    fn test_no_frame_extractor() {
        assert!(NoFrameExtractor.extract(b"video", "video/mp4").is_empty());
    }
}
