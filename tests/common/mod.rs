/*!
 * Common test utilities for the subwarden test suite
 */

use std::time::Duration;

use uuid::Uuid;

use subwarden::app_config::Config;
use subwarden::media::{MediaStream, StreamKind};
use subwarden::pipeline::{AcquisitionOutcome, AcquisitionPipeline};

/// Initialize test logging; safe to call from every test, only the first
/// call takes effect. Run with RUST_LOG=debug to see pipeline logs.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A pipeline configuration targeting German with Japanese/English sources
pub fn test_config() -> Config {
    init_logging();
    Config {
        target_language: "de".to_string(),
        preferred_source_languages: vec!["ja".to_string(), "en".to_string()],
        ..Default::default()
    }
}

/// A three-line German SRT payload, as a provider would serve it
pub fn sample_srt_de() -> &'static str {
    "1\n00:00:01,000 --> 00:00:04,000\nHallo zusammen.\n\n\
     2\n00:00:05,000 --> 00:00:09,000\nWie geht es dir?\n\n\
     3\n00:00:10,000 --> 00:00:14,000\nBis morgen.\n"
}

/// Build a subtitle stream descriptor for mock inspectors
pub fn subtitle_stream(index: u32, language: &str) -> MediaStream {
    MediaStream {
        index,
        kind: StreamKind::Subtitle,
        codec: "subrip".to_string(),
        language: Some(language.to_string()),
        forced: false,
        hearing_impaired: false,
    }
}

/// Build an audio stream descriptor for mock inspectors
pub fn audio_stream(index: u32, language: &str) -> MediaStream {
    MediaStream {
        index,
        kind: StreamKind::Audio,
        codec: "aac".to_string(),
        language: Some(language.to_string()),
        forced: false,
        hearing_impaired: false,
    }
}

/// Poll a pending transcription until the pipeline resolves it
pub async fn resolve_pending(
    pipeline: &AcquisitionPipeline,
    job_id: Uuid,
) -> AcquisitionOutcome {
    for _ in 0..300 {
        if let Some(outcome) = pipeline.resolve_transcription(job_id).await {
            return outcome;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Transcription job {} never resolved", job_id);
}
