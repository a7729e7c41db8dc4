pub mod asset;
pub mod report;
pub mod stage;

pub use asset::{AssetStatus, CreativeAsset, ErrorDetail, MediaKind, SourceProperties};
pub use report::{ReportEntry, Verdict};
pub use stage::{
    BrandConfig, BrandElements, Citation, CitationKind, Classification, ComplianceResult,
    CreativeType, DetailedResults, FrameAnalysis, FrameIndicators, StageOutcome, Transcript,
    TranscriptWord, UgcIndicators,
};
