use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::capability::{
    AssemblyAiClient, ChatCompletionsClient, LanguageCapability, TranscriptionCapability,
    VisionCapability,
};
use crate::config::{Config, StorageConfig};
use crate::db::AssetRepository;
use crate::error::BrandcheckError;
use crate::model::{
    AssetStatus, BrandConfig, ErrorDetail, FrameAnalysis, MediaKind, SourceProperties,
    StageOutcome, Transcript, UgcIndicators,
};
use crate::report::{aggregate, ComplianceReport};
use crate::sanitize;
use crate::stages::{
    AuthenticityClassifier, ComplianceChecker, Frame, FrameExtractor, NoFrameExtractor,
    TranscriptionError, TranscriptionStage, VisualAnalysisStage,
};
use crate::storage::{AssetStore, FilesystemStore, HttpObjectStore};

use super::config::PipelineConfig;
use super::context::{RunContext, RunOutcome};
use super::error::PipelineError;
use super::progress::{AssetPhase, ProgressEvent, ProgressReporter};

/// External collaborators of the pipeline.
#[derive(Clone)]
pub struct PipelineServices {
    pub repo: Arc<dyn AssetRepository>,
    pub store: Arc<dyn AssetStore>,
    pub vision: Arc<dyn VisionCapability>,
    pub transcription: Arc<dyn TranscriptionCapability>,
    pub language: Arc<dyn LanguageCapability>,
}

impl PipelineServices {
    /// Builds the HTTP store and capability clients described by `config`.
    pub fn from_config(
        config: &Config,
        repo: Arc<dyn AssetRepository>,
    ) -> Result<Self, BrandcheckError> {
        let store: Arc<dyn AssetStore> = match &config.storage {
            StorageConfig::Filesystem {
                root,
                public_base_url,
            } => Arc::new(FilesystemStore::new(root, public_base_url.as_str())),
            StorageConfig::Http {
                base_url,
                bucket,
                credentials,
                timeouts,
            } => Arc::new(HttpObjectStore::new(
                base_url.as_str(),
                bucket.as_str(),
                credentials.resolve("storage")?,
                timeouts.to_http_timeouts(),
            )?),
        };

        let vision = ChatCompletionsClient::new(
            config.vision.endpoint.as_str(),
            config.vision.model.as_str(),
            config.vision.credentials.resolve_optional("vision")?,
            config.vision.max_tokens,
            config.vision.timeouts.to_http_timeouts(),
        )?;
        let language = ChatCompletionsClient::new(
            config.language.endpoint.as_str(),
            config.language.model.as_str(),
            config.language.credentials.resolve_optional("language")?,
            config.language.max_tokens,
            config.language.timeouts.to_http_timeouts(),
        )?;
        let transcription = AssemblyAiClient::new(
            config.transcription.endpoint.as_str(),
            config.transcription.credentials.resolve("transcription")?,
            config.transcription.timeouts.to_http_timeouts(),
        )?;

        Ok(Self {
            repo,
            store,
            vision: Arc::new(vision),
            transcription: Arc::new(transcription),
            language: Arc::new(language),
        })
    }
}

pub struct Pipeline {
    repo: Arc<dyn AssetRepository>,
    store: Arc<dyn AssetStore>,
    visual: VisualAnalysisStage,
    classifier: AuthenticityClassifier,
    transcription: TranscriptionStage,
    compliance: ComplianceChecker,
    frames: Box<dyn FrameExtractor>,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig, services: PipelineServices) -> Self {
        Self {
            repo: services.repo,
            store: services.store,
            visual: VisualAnalysisStage::new(services.vision),
            classifier: AuthenticityClassifier::new(
                config.default_creative_type,
                config.default_confidence,
            ),
            transcription: TranscriptionStage::new(
                services.transcription,
                config.poll_interval,
                config.max_poll_attempts,
            ),
            compliance: ComplianceChecker::with_limits(
                services.language,
                config.confidence_threshold,
                config.max_transcript_chars,
            ),
            frames: Box::new(NoFrameExtractor),
        }
    }

    /// Production constructor: builds every collaborator from config.
    pub fn from_config(
        config: &Config,
        repo: Arc<dyn AssetRepository>,
    ) -> Result<Self, BrandcheckError> {
        let services = PipelineServices::from_config(config, repo)?;
        Ok(Self::new(&PipelineConfig::from_config(config), services))
    }

    pub fn with_frame_extractor(mut self, frames: Box<dyn FrameExtractor>) -> Self {
        self.frames = frames;
        self
    }

    pub fn repository(&self) -> &Arc<dyn AssetRepository> {
        &self.repo
    }

    /// Runs one asset from `pending` to `completed` or `failed`.
    ///
    /// Never returns an error: failures are persisted on the asset and
    /// reported through the outcome.
    pub async fn run(
        &self,
        asset_id: &str,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let span = info_span!(
            "pipeline",
            asset_id = %asset_id,
            media_kind = tracing::field::Empty,
            display_name = tracing::field::Empty,
        );
        self.run_inner(asset_id, progress, cancel)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        asset_id: &str,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let asset = match self.repo.find(asset_id) {
            Ok(Some(asset)) if asset.status == AssetStatus::Pending => asset,
            Ok(Some(asset)) => {
                debug!(status = %asset.status, "Asset is not pending, skipping");
                return RunOutcome::Skipped;
            }
            Ok(None) => {
                warn!("Asset not found, skipping");
                return RunOutcome::Skipped;
            }
            Err(e) => {
                error!(error = %e, "Failed to load asset");
                return RunOutcome::Failed {
                    stage: "load".to_string(),
                    message: e.to_string(),
                };
            }
        };

        let current = Span::current();
        current.record("media_kind", tracing::field::debug(asset.media_kind()));
        current.record(
            "display_name",
            sanitize::redact_path(Path::new(&asset.display_name)).as_str(),
        );

        if cancel.is_cancelled() {
            return RunOutcome::Skipped;
        }

        match self.repo.try_begin_processing(asset_id) {
            Ok(true) => {}
            Ok(false) => {
                debug!("Asset was claimed by another run, skipping");
                return RunOutcome::Skipped;
            }
            Err(e) => {
                error!(error = %e, "Failed to mark asset as processing");
                return RunOutcome::Failed {
                    stage: "persist".to_string(),
                    message: e.to_string(),
                };
            }
        }

        let mut ctx = RunContext::new(asset);
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = self.process(&mut ctx, progress, cancel) => result,
        };

        match result {
            Ok(report) => {
                info!(
                    overall_status = %report.overall_status,
                    compliance_score = report.compliance_score,
                    "Asset completed"
                );
                progress.report(ProgressEvent::Completed {
                    overall_status: report.overall_status,
                    compliance_score: report.compliance_score,
                });
                RunOutcome::Completed {
                    overall_status: report.overall_status,
                    compliance_score: report.compliance_score,
                }
            }
            Err(e) => self.fail(&ctx, e, progress),
        }
    }

    async fn process(
        &self,
        ctx: &mut RunContext,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<ComplianceReport, PipelineError> {
        // Step 1: Download and record source properties
        progress.report(ProgressEvent::Phase {
            phase: AssetPhase::Downloading,
            message: "Downloading asset...".to_string(),
        });
        self.step_download(ctx)
            .instrument(info_span!("download"))
            .await?;

        // Step 2: Visual analysis and transcription, concurrently
        progress.report(ProgressEvent::Phase {
            phase: AssetPhase::Analyzing,
            message: "Analyzing visuals and audio...".to_string(),
        });
        self.step_analyze(ctx, cancel).await?;

        // Step 3: Vocabulary compliance
        self.step_compliance(ctx, progress)
            .instrument(info_span!("vocabulary_compliance"))
            .await?;

        // Step 4: Aggregate
        {
            let _step = info_span!("aggregate").entered();
            progress.report(ProgressEvent::Phase {
                phase: AssetPhase::Aggregating,
                message: "Building compliance report...".to_string(),
            });
            self.step_aggregate(ctx);
        }

        // Step 5: Persist
        let _step = info_span!("persist").entered();
        progress.report(ProgressEvent::Phase {
            phase: AssetPhase::Saving,
            message: "Saving results...".to_string(),
        });
        self.step_persist(ctx)
    }

    async fn step_download(&self, ctx: &mut RunContext) -> Result<(), PipelineError> {
        let bytes = self.store.download(&ctx.asset.storage_path).await?;
        let properties = SourceProperties {
            file_size: bytes.len() as u64,
            mime_type: ctx.asset.mime_type.clone(),
            display_name: ctx.asset.display_name.clone(),
        };
        self.repo
            .record_source_properties(&ctx.asset.asset_id, &properties)?;

        debug!(
            bytes = bytes.len(),
            object = %sanitize::redact_path(Path::new(&ctx.asset.storage_path)),
            "Asset downloaded"
        );
        ctx.bytes = bytes;
        ctx.source_properties = Some(properties);
        Ok(())
    }

    async fn step_analyze(
        &self,
        ctx: &mut RunContext,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let kind = ctx.asset.media_kind();
        let frames = match kind {
            MediaKind::Image => vec![Frame {
                index: 0,
                bytes: std::mem::take(&mut ctx.bytes),
                mime_type: ctx.asset.mime_type.clone(),
            }],
            MediaKind::Video => self.frames.extract(&ctx.bytes, &ctx.asset.mime_type),
            MediaKind::Audio | MediaKind::Other => Vec::new(),
        };
        let media_url = self.store.public_url(&ctx.asset.storage_path);

        let (visual, transcription) = tokio::join!(
            self.analyze_visual(kind, &frames)
                .instrument(info_span!("visual_analysis", frames = frames.len())),
            self.transcribe_audio(kind, &media_url, cancel)
                .instrument(info_span!("transcription")),
        );
        let transcription = transcription?;

        if let StageOutcome::Failed { error } = &visual {
            warn!(error = %error, "Visual analysis failed");
        }

        let indicators: Vec<UgcIndicators> = visual
            .output()
            .map(|frames| frames.iter().map(|f| f.indicators.ugc).collect())
            .unwrap_or_default();
        let classification = self.classifier.classify(&indicators);
        debug!(
            creative_type = %classification.creative_type,
            confidence = classification.confidence,
            frames = classification.frames_analyzed,
            "Creative classified"
        );

        ctx.visual = Some(visual);
        ctx.transcription = Some(transcription);
        ctx.classification = Some(classification);
        ctx.bytes = Vec::new();
        Ok(())
    }

    async fn analyze_visual(
        &self,
        kind: MediaKind,
        frames: &[Frame],
    ) -> StageOutcome<Vec<FrameAnalysis>> {
        match kind {
            MediaKind::Image | MediaKind::Video => self.visual.analyze_frames(frames).await,
            MediaKind::Audio | MediaKind::Other => StageOutcome::skipped("no visual content"),
        }
    }

    async fn transcribe_audio(
        &self,
        kind: MediaKind,
        media_url: &str,
        cancel: &CancellationToken,
    ) -> Result<StageOutcome<Transcript>, PipelineError> {
        if !kind.has_audio() {
            return Ok(StageOutcome::skipped("no audio track"));
        }

        match self.transcription.transcribe(media_url, cancel).await {
            Ok(transcript) => Ok(StageOutcome::Completed { output: transcript }),
            Err(TranscriptionError::Cancelled) => Err(PipelineError::Cancelled),
            Err(e) => {
                warn!(
                    error = %e,
                    url = %sanitize::redact_url(media_url),
                    "Transcription failed"
                );
                Ok(StageOutcome::Failed {
                    error: e.to_string(),
                })
            }
        }
    }

    async fn step_compliance(
        &self,
        ctx: &mut RunContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        let transcript = match ctx.transcription.as_ref().and_then(|t| t.output()) {
            Some(transcript) if transcript.has_text() => transcript,
            _ => {
                ctx.compliance = Some(StageOutcome::skipped("no transcript"));
                return Ok(());
            }
        };

        progress.report(ProgressEvent::Phase {
            phase: AssetPhase::CheckingVocabulary,
            message: "Checking brand vocabulary...".to_string(),
        });

        let brand = match self.repo.brand_config(&ctx.asset.brand_id)? {
            Some(brand) => brand,
            None => {
                info!(brand_id = %ctx.asset.brand_id, "No vocabulary rules stored for brand");
                BrandConfig::unknown(&ctx.asset.brand_id)
            }
        };

        let outcome = match self.compliance.check(transcript, &brand).await {
            Ok(result) => StageOutcome::Completed { output: result },
            Err(e) => {
                warn!(error = %e, "Vocabulary compliance check failed");
                StageOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        ctx.compliance = Some(outcome);
        Ok(())
    }

    fn step_aggregate(&self, ctx: &mut RunContext) {
        if let Some(results) = ctx.detailed_results() {
            ctx.report = Some(aggregate(&results));
        }
    }

    fn step_persist(&self, ctx: &RunContext) -> Result<ComplianceReport, PipelineError> {
        let record = ctx.analysis_record().ok_or(PipelineError::MissingReport)?;
        self.repo.save_completed(&ctx.asset.asset_id, &record)?;
        Ok(record.report)
    }

    fn fail(
        &self,
        ctx: &RunContext,
        error: PipelineError,
        progress: &dyn ProgressReporter,
    ) -> RunOutcome {
        let detail = ErrorDetail::new(error.stage(), error.to_string());
        warn!(stage = %detail.stage, error = %detail.message, "Asset run failed");

        if let Err(e) = self.repo.save_failed(
            &ctx.asset.asset_id,
            &detail,
            ctx.detailed_results().as_ref(),
        ) {
            error!(error = %e, "Failed to record run failure");
        }

        progress.report(ProgressEvent::Failed {
            stage: detail.stage.clone(),
            error: detail.message.clone(),
        });
        RunOutcome::Failed {
            stage: detail.stage,
            message: detail.message,
        }
    }
}
