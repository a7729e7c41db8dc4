//! Brand vocabulary and pronunciation check over a transcript.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use super::prompt::{extract_json, prompt_field};
use super::StageError;
use crate::capability::LanguageCapability;
use crate::model::{BrandConfig, Citation, CitationKind, ComplianceResult, Transcript, Verdict};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;
pub const DEFAULT_MAX_TRANSCRIPT_CHARS: usize = 12_000;

/// Notes used when the model reply cannot be interpreted.
pub const MANUAL_REVIEW_NOTES: &str = "manual review recommended";

const MAX_BRAND_FIELD_CHARS: usize = 200;
const MAX_BANNED_TERMS: usize = 100;

#[derive(Debug, Deserialize)]
struct RawResult {
    status: String,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    citations: Vec<RawCitation>,
}

#[derive(Debug, Deserialize)]
struct RawCitation {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    spoken_text: String,
    #[serde(default)]
    timestamp_ms: f64,
    #[serde(default)]
    confidence: f64,
}

impl RawCitation {
    fn into_citation(self) -> Option<Citation> {
        let kind = match self.kind.to_ascii_lowercase().as_str() {
            "banned_word" | "banned_term" => CitationKind::BannedWord,
            "mispronunciation" => CitationKind::Mispronunciation,
            other => {
                debug!(kind = other, "Ignoring citation of unknown type");
                return None;
            }
        };
        Some(Citation {
            kind,
            spoken_text: self.spoken_text,
            timestamp_ms: self.timestamp_ms.max(0.0).round() as u64,
            confidence: self.confidence.clamp(0.0, 1.0),
        })
    }
}

pub struct ComplianceChecker {
    language: Arc<dyn LanguageCapability>,
    confidence_threshold: f64,
    max_transcript_chars: usize,
}

impl ComplianceChecker {
    pub fn new(language: Arc<dyn LanguageCapability>) -> Self {
        Self::with_limits(
            language,
            DEFAULT_CONFIDENCE_THRESHOLD,
            DEFAULT_MAX_TRANSCRIPT_CHARS,
        )
    }

    pub fn with_limits(
        language: Arc<dyn LanguageCapability>,
        confidence_threshold: f64,
        max_transcript_chars: usize,
    ) -> Self {
        Self {
            language,
            confidence_threshold,
            max_transcript_chars,
        }
    }

    /// Checks the transcript against the brand rules.
    ///
    /// Only a transport failure is an error; an uninterpretable reply
    /// degrades to a `warn` result.
    pub async fn check(
        &self,
        transcript: &Transcript,
        brand: &BrandConfig,
    ) -> Result<ComplianceResult, StageError> {
        let prompt = self.build_prompt(transcript, brand);
        let response = self.language.complete(&prompt).await?;

        match self.parse_response(&response) {
            Some(result) => Ok(result),
            None => {
                warn!(
                    brand_id = %brand.brand_id,
                    "Compliance response could not be parsed; falling back to manual review"
                );
                Ok(manual_review())
            }
        }
    }

    fn build_prompt(&self, transcript: &Transcript, brand: &BrandConfig) -> String {
        let brand_name = prompt_field(&brand.brand_name, MAX_BRAND_FIELD_CHARS);
        let pronunciation = brand
            .phonetic_pronunciation
            .as_deref()
            .map(|p| prompt_field(p, MAX_BRAND_FIELD_CHARS))
            .unwrap_or_else(|| "(not specified)".to_string());
        let banned_terms = if brand.banned_terms.is_empty() {
            "(none)".to_string()
        } else {
            brand
                .banned_terms
                .iter()
                .take(MAX_BANNED_TERMS)
                .map(|t| format!("- {}", prompt_field(t, MAX_BRAND_FIELD_CHARS)))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let transcript_text = prompt_field(&transcript.text, self.max_transcript_chars);
        let timed_words = prompt_field(&render_timed_words(transcript), self.max_transcript_chars);

        format!(
            r#"You are a brand compliance reviewer checking the spoken audio of an advertisement.

BRAND: {brand_name}
EXPECTED PRONUNCIATION: {pronunciation}
BANNED TERMS:
{banned_terms}

TRANSCRIPT:
{transcript_text}

WORDS WITH START TIMES (milliseconds):
{timed_words}

RULES:
1. Banned terms: be strict. Cite every occurrence of a banned term or an obvious variant of it as "banned_word".
2. Pronunciation: be lenient. Accents, regional variation and small slips are acceptable. Only cite "mispronunciation" when the brand name is clearly said wrong.
3. Use the start time of the cited word as timestamp_ms. Set confidence between 0 and 1.
4. status is "fail" if any banned term was used, "warn" for a clear mispronunciation only, otherwise "pass".

Respond with ONLY valid JSON in this exact format:
{{"status": "pass", "notes": "short explanation", "citations": [{{"type": "banned_word", "spoken_text": "word", "timestamp_ms": 1200, "confidence": 0.95}}]}}

JSON:"#
        )
    }

    /// Returns `None` when the reply has no usable JSON object or an
    /// unknown status.
    fn parse_response(&self, response: &str) -> Option<ComplianceResult> {
        let json = extract_json(response)?;
        let raw: RawResult = serde_json::from_str(json)
            .map_err(|e| debug!(error = %e, "Compliance JSON did not match the expected shape"))
            .ok()?;
        let status = Verdict::parse(raw.status.trim())?;

        let threshold = self.confidence_threshold;
        let citations = raw
            .citations
            .into_iter()
            .filter_map(RawCitation::into_citation)
            .filter(|c| c.kind == CitationKind::BannedWord || c.confidence > threshold)
            .collect::<Vec<_>>();
        let status = reconcile_status(status, &citations);

        Some(ComplianceResult {
            status,
            notes: raw.notes.trim().to_string(),
            citations,
        })
    }
}

/// Aligns the model's verdict with the citations that survived filtering:
/// a banned word always fails, and a `warn` with nothing left to cite passes.
fn reconcile_status(status: Verdict, citations: &[Citation]) -> Verdict {
    if citations.iter().any(|c| c.kind == CitationKind::BannedWord) {
        Verdict::Fail
    } else if status == Verdict::Warn && citations.is_empty() {
        Verdict::Pass
    } else {
        status
    }
}

fn manual_review() -> ComplianceResult {
    ComplianceResult {
        status: Verdict::Warn,
        notes: MANUAL_REVIEW_NOTES.to_string(),
        citations: Vec::new(),
    }
}

/// One `[start_ms] word` entry per line.
fn render_timed_words(transcript: &Transcript) -> String {
    if transcript.words.is_empty() {
        return "(no word timings available)".to_string();
    }
    let mut out = String::new();
    for word in &transcript.words {
        let _ = writeln!(out, "[{}] {}", word.start_ms, word.text);
    }
    out
}
