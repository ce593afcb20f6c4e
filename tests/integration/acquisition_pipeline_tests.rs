/*!
 * End-to-end acquisition tests walking all four stages with mock
 * collaborators.
 */

use std::sync::Arc;

use subwarden::media::MockInspector;
use subwarden::pipeline::{
    AcquisitionOutcome, AcquisitionPipeline, EventSender, LibraryItem, PipelineEvent, Stage,
    SubtitleSource,
};
use subwarden::providers::mock::MockProvider;
use subwarden::providers::ProviderRegistry;
use subwarden::transcription::MockTranscriber;
use subwarden::translation::backends::mock::MockBackend;
use subwarden::translation::TranslationManager;

use crate::common::{audio_stream, resolve_pending, subtitle_stream, test_config};

fn registry_with(providers: Vec<Arc<MockProvider>>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(provider);
    }
    registry
}

#[tokio::test]
async fn test_acquire_withEveryStageFailing_shouldFailWithOneTrailEntryPerStage() {
    // No embedded subtitles, a provider with nothing to offer, and a
    // transcription backend that refuses to work.
    let inspector = Arc::new(MockInspector::with_streams(vec![audio_stream(1, "jpn")]));
    let provider = Arc::new(MockProvider::new("empty", 1));

    let transcriber = Arc::new(MockTranscriber::speaking("unused", "en"));
    transcriber.fail_next(1);

    let cfg = test_config();
    let translator = TranslationManager::with_chain(vec![Arc::new(MockBackend::new())], &cfg);
    let pipeline = AcquisitionPipeline::new(
        cfg,
        inspector,
        registry_with(vec![provider]),
        translator,
        transcriber,
        EventSender::disabled(),
    );

    let item = LibraryItem::new("/media/lost.mkv", "Lost Film");
    let AcquisitionOutcome::Pending { job_id } = pipeline.acquire(&item).await else {
        panic!("Expected Pending after stages A-C failed");
    };

    let outcome = resolve_pending(&pipeline, job_id).await;
    let AcquisitionOutcome::Failed { trail } = outcome else {
        panic!("Expected terminal failure");
    };

    let stages: Vec<Stage> = trail.iter().map(|f| f.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::EmbeddedMatch,
            Stage::EmbeddedTranslate,
            Stage::ProviderDownload,
            Stage::Transcription,
        ]
    );
    for failure in &trail {
        assert!(!failure.error.is_empty());
    }
}

#[tokio::test]
async fn test_acquire_transcriptionFallback_shouldTranslateAndKeepSegmentTiming() {
    // Embedded Japanese audio only; the transcript comes back in English
    // and must be translated to the German target with timing intact.
    let inspector = Arc::new(MockInspector::with_streams(vec![audio_stream(1, "jpn")]));
    let transcriber = Arc::new(MockTranscriber::speaking("Hello world", "en"));

    let backend = Arc::new(MockBackend::new());
    backend.script("Hello world", "Hallo Welt");

    let cfg = test_config();
    let translator = TranslationManager::with_chain(vec![backend], &cfg);
    let pipeline = AcquisitionPipeline::new(
        cfg,
        inspector,
        ProviderRegistry::new(),
        translator,
        transcriber,
        EventSender::disabled(),
    );

    let item = LibraryItem::new("/media/episode.mkv", "Some Show");
    let AcquisitionOutcome::Pending { job_id } = pipeline.acquire(&item).await else {
        panic!("Expected Pending");
    };

    let outcome = resolve_pending(&pipeline, job_id).await;
    let AcquisitionOutcome::Done { source, subtitle } = outcome else {
        panic!("Expected Done via transcription");
    };

    assert_eq!(source, SubtitleSource::Transcription);
    assert_eq!(subtitle.language, "de");
    assert_eq!(subtitle.lines.len(), 1);
    assert_eq!(subtitle.lines[0].text, "Hallo Welt");
    assert_eq!(subtitle.lines[0].start_time_ms, 0);
    assert_eq!(subtitle.lines[0].end_time_ms, 2000);
}

#[tokio::test]
async fn test_acquire_transcriptionAlreadyInTarget_shouldSkipTranslation() {
    let inspector = Arc::new(MockInspector::with_streams(vec![audio_stream(1, "ger")]));
    let transcriber = Arc::new(MockTranscriber::speaking("Guten Morgen", "de"));

    let backend = Arc::new(MockBackend::new());
    let cfg = test_config();
    let translator = TranslationManager::with_chain(vec![backend.clone()], &cfg);
    let pipeline = AcquisitionPipeline::new(
        cfg,
        inspector,
        ProviderRegistry::new(),
        translator,
        transcriber,
        EventSender::disabled(),
    );

    let item = LibraryItem::new("/media/film.mkv", "Film");
    let AcquisitionOutcome::Pending { job_id } = pipeline.acquire(&item).await else {
        panic!("Expected Pending");
    };

    let outcome = resolve_pending(&pipeline, job_id).await;
    let AcquisitionOutcome::Done { source, subtitle } = outcome else {
        panic!("Expected Done via transcription");
    };

    assert_eq!(source, SubtitleSource::Transcription);
    assert_eq!(subtitle.lines[0].text, "Guten Morgen");
    // The translation chain was never consulted
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_acquire_withEmbeddedMatch_shouldPublishStartedAndResolvedEvents() {
    let inspector = Arc::new(MockInspector::with_streams(vec![
        subtitle_stream(2, "ger"),
        audio_stream(1, "jpn"),
    ]));
    inspector.script_subtitle(
        2,
        subwarden::subtitle::SubtitleDocument::parse_srt(crate::common::sample_srt_de(), "de")
            .unwrap(),
    );

    let (events, mut rx) = EventSender::channel();
    let cfg = test_config();
    let translator = TranslationManager::with_chain(vec![Arc::new(MockBackend::new())], &cfg);
    let pipeline = AcquisitionPipeline::new(
        cfg,
        inspector,
        ProviderRegistry::new(),
        translator,
        Arc::new(MockTranscriber::speaking("unused", "en")),
        events,
    );

    let item = LibraryItem::new("/media/film.mkv", "Film");
    let outcome = pipeline.acquire(&item).await;
    assert!(matches!(outcome, AcquisitionOutcome::Done { .. }));

    let first = rx.try_recv().expect("Expected a first event");
    assert!(matches!(
        first,
        PipelineEvent::StageStarted { stage: Stage::EmbeddedMatch, .. }
    ));

    let mut resolved = false;
    while let Ok(event) = rx.try_recv() {
        if let PipelineEvent::ItemResolved { source, .. } = event {
            assert_eq!(source, SubtitleSource::Embedded);
            resolved = true;
        }
    }
    assert!(resolved, "Expected an ItemResolved event");
}
