use serde::{Deserialize, Serialize};

use crate::model::{
    Citation, Classification, ComplianceResult, DetailedResults, FrameAnalysis, ReportEntry,
    StageOutcome, Verdict,
};

pub const LOGO_USAGE: &str = "Logo Usage";
pub const COLOR_PALETTE: &str = "Color Palette";
pub const CONTENT_TYPE: &str = "Content Type";
pub const BRAND_VOCABULARY: &str = "Brand Vocabulary";

/// Details used when an asset has no usable transcript.
pub const NO_AUDIO_DETAILS: &str = "No audio content to analyze.";

/// The aggregated, user-facing outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub frontend_report: Vec<ReportEntry>,
    pub overall_status: Verdict,
    pub compliance_score: u8,
}

/// Builds the fixed four-check report from whatever the stages produced.
///
/// Every check is emitted regardless of which stages succeeded, always in
/// the same order.
pub fn aggregate(results: &DetailedResults) -> ComplianceReport {
    let frames: &[FrameAnalysis] = results
        .visual
        .output()
        .map(|frames| frames.as_slice())
        .unwrap_or_default();

    let frontend_report = vec![
        logo_usage(frames, &results.visual),
        color_palette(frames, &results.visual),
        content_type(&results.classification),
        brand_vocabulary(&results.compliance),
    ];

    let overall_status = overall_status(&frontend_report);
    let compliance_score = compliance_score(&frontend_report);

    ComplianceReport {
        frontend_report,
        overall_status,
        compliance_score,
    }
}

/// Fail if any entry fails, else warn if any warns, else pass.
pub fn overall_status(entries: &[ReportEntry]) -> Verdict {
    if entries.iter().any(|e| e.result == Verdict::Fail) {
        Verdict::Fail
    } else if entries.iter().any(|e| e.result == Verdict::Warn) {
        Verdict::Warn
    } else {
        Verdict::Pass
    }
}

/// Percentage of passing entries, rounded half-up to an integer.
pub fn compliance_score(entries: &[ReportEntry]) -> u8 {
    let total = entries.len();
    if total == 0 {
        return 0;
    }
    let passed = entries.iter().filter(|e| e.result == Verdict::Pass).count();
    ((200 * passed + total) / (2 * total)) as u8
}

fn visual_unavailable(visual: &StageOutcome<Vec<FrameAnalysis>>) -> Option<&'static str> {
    match visual {
        StageOutcome::Completed { .. } => None,
        StageOutcome::Failed { .. } => Some("Visual analysis failed"),
        StageOutcome::Skipped { .. } => Some("No frames were analyzed"),
    }
}

fn logo_usage(frames: &[FrameAnalysis], visual: &StageOutcome<Vec<FrameAnalysis>>) -> ReportEntry {
    let logo_frame = frames
        .iter()
        .find(|f| f.indicators.brand.logo_visible || !f.logos.is_empty());

    match logo_frame {
        Some(frame) if !frame.logos.is_empty() => ReportEntry::new(
            LOGO_USAGE,
            Verdict::Pass,
            format!("Brand logo detected: {}.", frame.logos.join(", ")),
        ),
        Some(_) => ReportEntry::new(LOGO_USAGE, Verdict::Pass, "Brand logo detected."),
        None => {
            let details = match visual_unavailable(visual) {
                Some(reason) => format!("{}; logo placement could not be verified.", reason),
                None => "No brand logo detected.".to_string(),
            };
            ReportEntry::new(LOGO_USAGE, Verdict::Warn, details)
        }
    }
}

fn color_palette(
    frames: &[FrameAnalysis],
    visual: &StageOutcome<Vec<FrameAnalysis>>,
) -> ReportEntry {
    let mut colors: Vec<&str> = Vec::new();
    for color in frames.iter().flat_map(|f| f.dominant_colors.iter()) {
        if !colors.iter().any(|c| c.eq_ignore_ascii_case(color)) {
            colors.push(color);
        }
    }

    if !colors.is_empty() {
        return ReportEntry::new(
            COLOR_PALETTE,
            Verdict::Pass,
            format!("Dominant colors detected: {}.", colors.join(", ")),
        );
    }

    let details = match visual_unavailable(visual) {
        Some(reason) => format!("{}; color palette could not be verified.", reason),
        None => "No dominant colors detected.".to_string(),
    };
    ReportEntry::new(COLOR_PALETTE, Verdict::Warn, details)
}

fn content_type(classification: &Classification) -> ReportEntry {
    let percent = (classification.confidence * 100.0).round() as u32;
    let mut details = format!(
        "Classified as {} with {}% confidence.",
        classification.creative_type, percent
    );
    if classification.defaulted {
        details.push_str(" No frames were analyzed; default classification applied.");
    }
    ReportEntry::new(CONTENT_TYPE, Verdict::Pass, details)
}

fn brand_vocabulary(compliance: &StageOutcome<ComplianceResult>) -> ReportEntry {
    match compliance {
        StageOutcome::Completed { output } => ReportEntry::new(
            BRAND_VOCABULARY,
            output.status,
            vocabulary_details(&output.notes, &output.citations),
        ),
        StageOutcome::Failed { .. } => ReportEntry::new(
            BRAND_VOCABULARY,
            Verdict::Warn,
            "Vocabulary check unavailable; manual review recommended.",
        ),
        StageOutcome::Skipped { .. } => {
            ReportEntry::new(BRAND_VOCABULARY, Verdict::Pass, NO_AUDIO_DETAILS)
        }
    }
}

fn vocabulary_details(notes: &str, citations: &[Citation]) -> String {
    let notes = notes.trim();
    if citations.is_empty() {
        return notes.to_string();
    }

    let rendered: Vec<String> = citations.iter().map(render_citation).collect();
    let citations_text = format!("Citations: {}", rendered.join("; "));
    if notes.is_empty() {
        citations_text
    } else {
        format!("{} {}", notes, citations_text)
    }
}

/// Renders a citation as `'<spoken text>' at <seconds>s`.
pub fn render_citation(citation: &Citation) -> String {
    format!(
        "'{}' at {}s",
        citation.spoken_text,
        citation.timestamp_ms as f64 / 1000.0
    )
}
