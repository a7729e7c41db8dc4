use crate::db::AnalysisRecord;
use crate::model::{
    Classification, ComplianceResult, CreativeAsset, DetailedResults, FrameAnalysis,
    SourceProperties, StageOutcome, Transcript, Verdict,
};
use crate::report::ComplianceReport;

/// How a call to `Pipeline::run` ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The asset was missing or not pending; nothing was touched.
    Skipped,
    Completed {
        overall_status: Verdict,
        compliance_score: u8,
    },
    Failed {
        stage: String,
        message: String,
    },
}

/// State accumulated while one asset moves through the stages.
pub struct RunContext {
    pub asset: CreativeAsset,

    // Set after download
    pub bytes: Vec<u8>,
    pub source_properties: Option<SourceProperties>,

    // Set after the concurrent analysis step
    pub visual: Option<StageOutcome<Vec<FrameAnalysis>>>,
    pub transcription: Option<StageOutcome<Transcript>>,
    pub classification: Option<Classification>,

    pub compliance: Option<StageOutcome<ComplianceResult>>,

    pub report: Option<ComplianceReport>,
}

impl RunContext {
    pub fn new(asset: CreativeAsset) -> Self {
        Self {
            asset,
            bytes: Vec::new(),
            source_properties: None,
            visual: None,
            transcription: None,
            classification: None,
            compliance: None,
            report: None,
        }
    }

    /// Stage outputs so far; stages that never ran are marked skipped.
    /// `None` until classification has happened.
    pub fn detailed_results(&self) -> Option<DetailedResults> {
        let classification = self.classification.clone()?;
        Some(DetailedResults {
            source_properties: self.source_properties.clone(),
            visual: self
                .visual
                .clone()
                .unwrap_or_else(|| StageOutcome::skipped("not run")),
            classification,
            transcription: self
                .transcription
                .clone()
                .unwrap_or_else(|| StageOutcome::skipped("not run")),
            compliance: self
                .compliance
                .clone()
                .unwrap_or_else(|| StageOutcome::skipped("not run")),
        })
    }

    /// Record to persist on success. `None` until the report exists.
    pub fn analysis_record(&self) -> Option<AnalysisRecord> {
        let detailed_results = self.detailed_results()?;
        let report = self.report.clone()?;
        Some(AnalysisRecord {
            classification: detailed_results.classification.clone(),
            raw_transcript: detailed_results.transcription.output().cloned(),
            vocabulary_compliance_result: detailed_results.compliance.output().cloned(),
            detailed_results,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::aggregate;
    use crate::stages::AuthenticityClassifier;

    fn asset() -> CreativeAsset {
        CreativeAsset::new_pending(
            "a1".to_string(),
            "c1".to_string(),
            "b1".to_string(),
            "c1/a1.mp3".to_string(),
            "audio/mpeg".to_string(),
            "a1.mp3".to_string(),
        )
    }

    #[test]
    fn test_nothing_before_classification() {
        let ctx = RunContext::new(asset());
        assert!(ctx.detailed_results().is_none());
        assert!(ctx.analysis_record().is_none());
    }

    #[test]
    fn test_missing_stages_are_marked_skipped() {
        let mut ctx = RunContext::new(asset());
        ctx.classification = Some(AuthenticityClassifier::default().classify(&[]));
        let results = ctx.detailed_results().unwrap();
        assert!(matches!(results.visual, StageOutcome::Skipped { .. }));
        assert!(matches!(results.compliance, StageOutcome::Skipped { .. }));

        ctx.report = Some(aggregate(&results));
        let record = ctx.analysis_record().unwrap();
        assert!(record.raw_transcript.is_none());
        assert!(record.vocabulary_compliance_result.is_none());
    }
}
