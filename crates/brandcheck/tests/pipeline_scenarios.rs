//! End-to-end pipeline scenarios against scripted capabilities.

mod common;

use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use brandcheck::model::{
    AssetStatus, CitationKind, CreativeType, ErrorDetail, StageOutcome, Verdict,
};
use brandcheck::pipeline::{
    AssetPhase, NoopProgress, Pipeline, ProgressEvent, ProgressReporter, RunOutcome,
};
use brandcheck::report::aggregator::{
    BRAND_VOCABULARY, COLOR_PALETTE, CONTENT_TYPE, LOGO_USAGE, NO_AUDIO_DETAILS,
};
use brandcheck::stages::compliance::MANUAL_REVIEW_NOTES;
use brandcheck::stages::{Frame, FrameExtractor};
use brandcheck::db::AssetRepository;

use common::{BrandBuilder, ComplianceReply, ScriptedTranscript, TestHarness, VisionReply};

/// Collects every event reported during a run.
#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Splits a video into a fixed number of identical frames.
struct FixedFrames(u32);

impl FrameExtractor for FixedFrames {
    fn extract(&self, video: &[u8], _mime_type: &str) -> Vec<Frame> {
        (0..self.0)
            .map(|index| Frame {
                index,
                bytes: video.to_vec(),
                mime_type: "image/jpeg".to_string(),
            })
            .collect()
    }
}

#[tokio::test]
async fn clean_image_scores_100() {
    let harness = TestHarness::new();
    harness.add_asset("img-1", "hero.png", "image/png");

    let outcome = harness.run("img-1").await;
    assert_eq!(
        outcome,
        RunOutcome::Completed {
            overall_status: Verdict::Pass,
            compliance_score: 100,
        }
    );

    let asset = harness.find("img-1");
    assert_eq!(asset.status, AssetStatus::Completed);
    assert!(asset.completed_at.is_some());
    assert!(asset.error_detail.is_none());
    assert_eq!(asset.creative_type, Some(CreativeType::Ugc));

    let report = asset.frontend_report.unwrap();
    let names: Vec<&str> = report.iter().map(|e| e.check_name.as_str()).collect();
    assert_eq!(names, [LOGO_USAGE, COLOR_PALETTE, CONTENT_TYPE, BRAND_VOCABULARY]);
    assert!(report.iter().all(|e| e.result == Verdict::Pass));
    assert_eq!(report[3].details, NO_AUDIO_DETAILS);

    // Images are never sent for transcription.
    assert!(harness.transcription.submitted.lock().unwrap().is_empty());
    assert!(harness.last_prompt().is_none());
}

#[tokio::test]
async fn transcription_timeout_still_completes() {
    let harness = TestHarness::new();
    harness.set_transcript(ScriptedTranscript::NeverCompletes);
    harness.add_asset("vid-1", "spot.mp4", "video/mp4");

    let outcome = harness.run("vid-1").await;
    assert!(matches!(outcome, RunOutcome::Completed { .. }));

    let asset = harness.find("vid-1");
    assert_eq!(asset.status, AssetStatus::Completed);
    assert!(asset.raw_transcript.is_none());
    assert_eq!(
        harness
            .transcription
            .polls
            .load(std::sync::atomic::Ordering::SeqCst),
        3
    );

    let results = asset.detailed_results.unwrap();
    assert!(results.transcription.is_failed());
    assert!(matches!(results.compliance, StageOutcome::Skipped { .. }));

    let report = asset.frontend_report.unwrap();
    assert_eq!(report[3].result, Verdict::Pass);
    assert_eq!(report[3].details, NO_AUDIO_DETAILS);
}

#[tokio::test]
async fn video_without_frames_uses_classifier_prior() {
    let harness = TestHarness::new();
    harness.add_asset("vid-2", "spot.mp4", "video/mp4");

    harness.run("vid-2").await;

    let asset = harness.find("vid-2");
    let classification = asset.ugc_detection_data.unwrap();
    assert!(classification.defaulted);
    assert_eq!(classification.creative_type, CreativeType::Ugc);
    assert_eq!(harness.vision.calls.load(std::sync::atomic::Ordering::SeqCst), 0);

    // Logo and colors cannot be verified without frames: 2 pass, 2 warn.
    assert_eq!(asset.overall_status, Some(Verdict::Warn));
    assert_eq!(asset.compliance_score, Some(50));
}

#[tokio::test]
async fn video_frames_are_classified_together() {
    let harness = TestHarness::new();
    harness.set_vision_reply(&VisionReply::clean().produced().build());
    harness.add_asset("vid-3", "studio.mp4", "video/mp4");

    let pipeline = harness.pipeline().with_frame_extractor(Box::new(FixedFrames(3)));
    pipeline
        .run("vid-3", &NoopProgress, &CancellationToken::new())
        .await;

    let classification = harness.find("vid-3").ugc_detection_data.unwrap();
    assert_eq!(classification.frames_analyzed, 3);
    assert_eq!(classification.ugc_votes, 0);
    assert_eq!(classification.creative_type, CreativeType::Produced);
    assert_eq!(harness.vision.calls.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[tokio::test]
async fn banned_term_fails_the_asset() {
    let harness = TestHarness::new();
    harness.upsert_brand(
        &BrandBuilder::new("brand-1", "Acme")
            .pronunciation("AK-mee")
            .banned("cheap")
            .build(),
    );
    harness.set_transcript(ScriptedTranscript::Completes(
        "try the cheap acme cola today".to_string(),
    ));
    harness.set_language_reply(
        &ComplianceReply::new("fail", "Banned term 'cheap' used.")
            .citation("banned_word", "cheap", 800, 0.97)
            .build(),
    );
    harness.add_asset("aud-1", "radio.mp3", "audio/mpeg");

    let outcome = harness.run("aud-1").await;
    assert_eq!(
        outcome,
        RunOutcome::Completed {
            overall_status: Verdict::Fail,
            compliance_score: 75,
        }
    );

    let asset = harness.find("aud-1");
    assert_eq!(asset.status, AssetStatus::Completed);
    assert_eq!(asset.raw_transcript.unwrap().words.len(), 5);

    let report = asset.frontend_report.unwrap();
    assert_eq!(report[3].result, Verdict::Fail);
    assert!(report[3].details.contains("'cheap' at 0.8s"));

    let prompt = harness.last_prompt().unwrap();
    assert!(prompt.contains("BRAND: Acme"));
    assert!(prompt.contains("EXPECTED PRONUNCIATION: AK-mee"));
    assert!(prompt.contains("- cheap"));
    assert!(prompt.contains("[800] cheap"));

    let submitted = harness.transcription.submitted.lock().unwrap();
    assert_eq!(
        submitted.as_slice(),
        ["https://cdn.example.com/creatives/campaign-1/radio.mp3"]
    );
}

#[tokio::test]
async fn low_confidence_mispronunciation_is_dropped() {
    let harness = TestHarness::new();
    harness.set_transcript(ScriptedTranscript::Completes(
        "grab an acmy cola it's cheap".to_string(),
    ));
    harness.set_language_reply(
        &ComplianceReply::new("fail", "Mixed findings.")
            .citation("mispronunciation", "acmy", 800, 0.75)
            .citation("banned_word", "cheap", 2000, 0.6)
            .citation("mispronunciation", "acmy", 800, 0.92)
            .build(),
    );
    harness.add_asset("aud-2", "radio.mp3", "audio/mpeg");

    harness.run("aud-2").await;

    let result = harness.find("aud-2").vocabulary_compliance_result.unwrap();
    let kinds: Vec<(CitationKind, f64)> = result
        .citations
        .iter()
        .map(|c| (c.kind, c.confidence))
        .collect();
    assert_eq!(
        kinds,
        [
            (CitationKind::BannedWord, 0.6),
            (CitationKind::Mispronunciation, 0.92)
        ]
    );
}

#[tokio::test]
async fn unknown_brand_falls_back_to_placeholder() {
    let harness = TestHarness::new();
    harness.set_transcript(ScriptedTranscript::Completes("hello there".to_string()));
    harness.add_asset("aud-3", "radio.mp3", "audio/mpeg");

    harness.run("aud-3").await;

    let prompt = harness.last_prompt().unwrap();
    assert!(prompt.contains("BRAND: Unknown brand"));
    assert!(prompt.contains("EXPECTED PRONUNCIATION: (not specified)"));
    assert!(prompt.contains("(none)"));
}

#[tokio::test]
async fn unparseable_compliance_reply_asks_for_review() {
    let harness = TestHarness::new();
    harness.set_transcript(ScriptedTranscript::Completes("hello there".to_string()));
    harness.set_language_reply("I'm sorry, I can't evaluate this transcript.");
    harness.add_asset("aud-4", "radio.mp3", "audio/mpeg");

    let outcome = harness.run("aud-4").await;
    assert!(matches!(outcome, RunOutcome::Completed { .. }));

    let asset = harness.find("aud-4");
    let result = asset.vocabulary_compliance_result.unwrap();
    assert_eq!(result.status, Verdict::Warn);
    assert_eq!(result.notes, MANUAL_REVIEW_NOTES);
    assert_eq!(asset.frontend_report.unwrap()[3].result, Verdict::Warn);
}

#[tokio::test]
async fn transcription_service_error_is_recorded() {
    let harness = TestHarness::new();
    harness.set_transcript(ScriptedTranscript::Errors("unsupported codec".to_string()));
    harness.add_asset("aud-5", "radio.mp3", "audio/mpeg");

    let outcome = harness.run("aud-5").await;
    assert!(matches!(outcome, RunOutcome::Completed { .. }));

    let results = harness.find("aud-5").detailed_results.unwrap();
    match results.transcription {
        StageOutcome::Failed { error } => assert!(error.contains("unsupported codec")),
        other => panic!("unexpected transcription outcome: {:?}", other),
    }
}

#[tokio::test]
async fn vision_failure_degrades_visual_checks() {
    let harness = TestHarness::new();
    harness.fail_vision("model overloaded");
    harness.add_asset("img-2", "banner.jpg", "image/jpeg");

    let outcome = harness.run("img-2").await;
    assert_eq!(
        outcome,
        RunOutcome::Completed {
            overall_status: Verdict::Warn,
            compliance_score: 50,
        }
    );

    let asset = harness.find("img-2");
    assert!(asset.detailed_results.unwrap().visual.is_failed());
    let report = asset.frontend_report.unwrap();
    assert!(report[0].details.starts_with("Visual analysis failed"));
    assert_eq!(report[1].result, Verdict::Warn);
}

#[tokio::test]
async fn download_failure_marks_asset_failed() {
    let harness = TestHarness::new();
    harness.insert_asset("img-3", "campaign-1/gone.png", "gone.png", "image/png");

    let outcome = harness.run("img-3").await;
    assert!(matches!(outcome, RunOutcome::Failed { ref stage, .. } if stage == "download"));

    let asset = harness.find("img-3");
    assert_eq!(asset.status, AssetStatus::Failed);
    assert_eq!(asset.error_detail.unwrap().stage, "download");
    assert!(asset.frontend_report.is_none());
    assert!(asset.overall_status.is_none());
}

#[tokio::test]
async fn requeue_after_failure_completes() {
    let harness = TestHarness::new();
    harness.insert_asset("img-4", "campaign-1/late.png", "late.png", "image/png");
    harness.run("img-4").await;
    assert_eq!(harness.find("img-4").status, AssetStatus::Failed);

    harness.put_object("campaign-1/late.png", b"arrived late");
    harness.repo.requeue("img-4").unwrap();

    let outcome = harness.run("img-4").await;
    assert!(matches!(outcome, RunOutcome::Completed { .. }));

    let asset = harness.find("img-4");
    assert_eq!(asset.status, AssetStatus::Completed);
    assert!(asset.error_detail.is_none());
    assert_eq!(asset.attempts, 2);
    assert_eq!(asset.file_size, Some(12));
}

#[tokio::test]
async fn requeue_reproduces_identical_report() {
    let harness = TestHarness::new();
    harness.set_transcript(ScriptedTranscript::Completes(
        "the acme cola for everyone".to_string(),
    ));
    harness.set_language_reply(
        &ComplianceReply::new("warn", "Brand name slightly off.")
            .citation("mispronunciation", "acme", 400, 0.9)
            .build(),
    );
    harness.add_asset("vid-4", "spot.mp4", "video/mp4");

    harness.run("vid-4").await;
    let first = harness.find("vid-4");
    let first_report = serde_json::to_string(&first.frontend_report).unwrap();

    harness
        .repo
        .save_failed("vid-4", &ErrorDetail::new("persist", "operator retry"), None)
        .unwrap();
    harness.repo.requeue("vid-4").unwrap();
    harness.run("vid-4").await;

    let second = harness.find("vid-4");
    let second_report = serde_json::to_string(&second.frontend_report).unwrap();
    assert_eq!(first_report, second_report);
    assert_eq!(first.overall_status, second.overall_status);
    assert_eq!(first.compliance_score, second.compliance_score);
    assert_eq!(second.attempts, 2);
}

#[tokio::test]
async fn non_pending_asset_is_not_mutated() {
    let harness = TestHarness::new();
    harness.add_asset("img-5", "hero.png", "image/png");
    harness.run("img-5").await;
    let completed = harness.find("img-5");

    assert_eq!(harness.run("img-5").await, RunOutcome::Skipped);
    assert_eq!(harness.find("img-5"), completed);
    assert_eq!(harness.vision.calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    assert_eq!(harness.run("does-not-exist").await, RunOutcome::Skipped);
}

#[tokio::test]
async fn cancellation_fails_the_run() {
    let mut harness = TestHarness::new();
    harness.config.poll_interval = Duration::from_secs(30);
    harness.set_transcript(ScriptedTranscript::NeverCompletes);
    harness.add_asset("aud-6", "radio.mp3", "audio/mpeg");

    let pipeline: Pipeline = harness.pipeline();
    let cancel = CancellationToken::new();
    let (outcome, _) = tokio::join!(pipeline.run("aud-6", &NoopProgress, &cancel), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    assert!(matches!(outcome, RunOutcome::Failed { ref stage, .. } if stage == "cancelled"));
    let asset = harness.find("aud-6");
    assert_eq!(asset.status, AssetStatus::Failed);
    assert_eq!(asset.error_detail.unwrap().stage, "cancelled");
    // Source properties were recorded before the cancellation.
    assert!(asset.source_properties.is_some());
}

#[tokio::test]
async fn progress_events_follow_the_run() {
    let harness = TestHarness::new();
    harness.set_transcript(ScriptedTranscript::Completes("hello there".to_string()));
    harness.add_asset("aud-7", "radio.mp3", "audio/mpeg");

    let progress = RecordingProgress::default();
    harness
        .run_with("aud-7", &progress, &CancellationToken::new())
        .await;

    let events = progress.events.into_inner().unwrap();
    let phases: Vec<AssetPhase> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Phase { phase, .. } => Some(*phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        [
            AssetPhase::Downloading,
            AssetPhase::Analyzing,
            AssetPhase::CheckingVocabulary,
            AssetPhase::Aggregating,
            AssetPhase::Saving,
        ]
    );
    assert!(matches!(events.last(), Some(ProgressEvent::Completed { .. })));
}
