/*!
 * Stage C integration: search, ranking and the bounded download ladder
 * driving the health tracker.
 */

use std::sync::Arc;

use subwarden::media::MockInspector;
use subwarden::pipeline::{
    AcquisitionOutcome, AcquisitionPipeline, EventSender, LibraryItem, SubtitleSource,
};
use subwarden::providers::mock::MockProvider;
use subwarden::providers::ProviderRegistry;
use subwarden::transcription::MockTranscriber;
use subwarden::translation::backends::mock::MockBackend;
use subwarden::translation::TranslationManager;

use crate::common::{audio_stream, sample_srt_de, test_config};

fn pipeline_with(providers: Vec<Arc<MockProvider>>) -> AcquisitionPipeline {
    let inspector = Arc::new(MockInspector::with_streams(vec![audio_stream(1, "jpn")]));
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(provider);
    }

    let cfg = test_config();
    let translator = TranslationManager::with_chain(vec![Arc::new(MockBackend::new())], &cfg);
    AcquisitionPipeline::new(
        cfg,
        inspector,
        registry,
        translator,
        Arc::new(MockTranscriber::speaking("unused", "en")),
        EventSender::disabled(),
    )
}

#[tokio::test]
async fn test_acquire_withHealthyProvider_shouldDownloadAndRecordSuccess() {
    let provider = Arc::new(MockProvider::new("fast", 1));
    provider.add_candidate(MockProvider::candidate("fast", "c1", "de"), sample_srt_de());

    let pipeline = pipeline_with(vec![provider.clone()]);
    let item = LibraryItem::new("/media/film.mkv", "Film");

    let AcquisitionOutcome::Done { source, subtitle } = pipeline.acquire(&item).await else {
        panic!("Expected Done via provider download");
    };

    assert_eq!(source, SubtitleSource::Provider("fast".to_string()));
    assert_eq!(subtitle.language, "de");
    assert_eq!(subtitle.lines.len(), 3);
    assert_eq!(subtitle.lines[0].text, "Hallo zusammen.");
    assert_eq!(provider.download_calls(), 1);

    let stats = pipeline.health().get_stats("fast").expect("Stats missing");
    assert!(stats.successful_downloads >= 1);
    assert!(!stats.auto_disabled);
}

#[tokio::test]
async fn test_acquire_withFailingBestCandidate_shouldFallToNextAndRecordBoth() {
    // Equal scores; "flaky" wins the priority tie-break and fails, so the
    // ladder moves on to "backup".
    let flaky = Arc::new(MockProvider::new("flaky", 1));
    flaky.add_candidate(MockProvider::candidate("flaky", "f1", "de"), sample_srt_de());
    flaky.fail_next_downloads(1);

    let backup = Arc::new(MockProvider::new("backup", 5));
    backup.add_candidate(MockProvider::candidate("backup", "b1", "de"), sample_srt_de());

    let pipeline = pipeline_with(vec![flaky.clone(), backup.clone()]);
    let item = LibraryItem::new("/media/film.mkv", "Film");

    let AcquisitionOutcome::Done { source, .. } = pipeline.acquire(&item).await else {
        panic!("Expected Done via the backup provider");
    };

    assert_eq!(source, SubtitleSource::Provider("backup".to_string()));
    assert_eq!(flaky.download_calls(), 1);
    assert_eq!(backup.download_calls(), 1);

    // Both the failed and the successful attempt were recorded
    let flaky_stats = pipeline.health().get_stats("flaky").expect("Stats missing");
    assert!(flaky_stats.successful_downloads < flaky_stats.total_searches);
    let backup_stats = pipeline.health().get_stats("backup").expect("Stats missing");
    assert!(backup_stats.successful_downloads >= 1);
}

#[tokio::test]
async fn test_acquire_withUnparseablePayload_shouldTryNextCandidate() {
    let garbage = Arc::new(MockProvider::new("garbage", 1));
    garbage.add_candidate(
        MockProvider::candidate("garbage", "g1", "de"),
        "this is not an srt file",
    );

    let good = Arc::new(MockProvider::new("good", 5));
    good.add_candidate(MockProvider::candidate("good", "ok1", "de"), sample_srt_de());

    let pipeline = pipeline_with(vec![garbage, good]);
    let item = LibraryItem::new("/media/film.mkv", "Film");

    let AcquisitionOutcome::Done { source, subtitle } = pipeline.acquire(&item).await else {
        panic!("Expected Done despite the unparseable best candidate");
    };

    assert_eq!(source, SubtitleSource::Provider("good".to_string()));
    assert_eq!(subtitle.lines.len(), 3);
}

#[tokio::test]
async fn test_acquire_withForeignLanguageCandidate_shouldTranslateDownload() {
    let provider = Arc::new(MockProvider::new("fast", 1));
    let payload = "1\n00:00:01,000 --> 00:00:03,000\nHello there.\n";
    provider.add_candidate(MockProvider::candidate("fast", "c1", "en"), payload);

    let inspector = Arc::new(MockInspector::with_streams(vec![audio_stream(1, "jpn")]));
    let mut registry = ProviderRegistry::new();
    registry.register(provider);

    let backend = Arc::new(MockBackend::new());
    backend.script("Hello there.", "Hallo du.");

    let cfg = test_config();
    let translator = TranslationManager::with_chain(vec![backend], &cfg);
    let pipeline = AcquisitionPipeline::new(
        cfg,
        inspector,
        registry,
        translator,
        Arc::new(MockTranscriber::speaking("unused", "en")),
        EventSender::disabled(),
    );

    let item = LibraryItem::new("/media/film.mkv", "Film");
    let AcquisitionOutcome::Done { source, subtitle } = pipeline.acquire(&item).await else {
        panic!("Expected Done with a translated download");
    };

    assert_eq!(source, SubtitleSource::Provider("fast".to_string()));
    assert_eq!(subtitle.language, "de");
    assert_eq!(subtitle.lines[0].text, "Hallo du.");
    // Timing survives translation
    assert_eq!(subtitle.lines[0].start_time_ms, 1000);
    assert_eq!(subtitle.lines[0].end_time_ms, 3000);
}
