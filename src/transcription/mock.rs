/*!
 * In-process transcription backend for tests.
 *
 * Returns a scripted transcript, reports per-segment progress through the
 * callback, and can inject failures and artificial delays.
 */

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::TranscriptionError;

use super::backend::{ProgressFn, TranscriptionBackend};
use super::{Transcript, TranscriptSegment};

/// Scripted transcription backend for tests.
pub struct MockTranscriber {
    /// Transcript returned by every call
    transcript: Mutex<Transcript>,

    /// Number of upcoming calls that fail
    fail_next: AtomicUsize,

    /// Artificial delay before completing
    delay: Mutex<Option<Duration>>,

    /// Number of transcribe calls observed
    calls: AtomicUsize,
}

impl MockTranscriber {
    /// Create a backend that returns a one-segment transcript of `text`.
    pub fn speaking(text: &str, language: &str) -> Self {
        Self::with_transcript(Transcript {
            text: text.to_string(),
            segments: vec![TranscriptSegment {
                start_ms: 0,
                end_ms: 2000,
                text: text.to_string(),
            }],
            detected_language: language.to_string(),
        })
    }

    /// Create a backend that returns the given transcript.
    pub fn with_transcript(transcript: Transcript) -> Self {
        Self {
            transcript: Mutex::new(transcript),
            fail_next: AtomicUsize::new(0),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Make the next `count` calls fail.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Delay every call by `delay`, for timeout tests.
    pub fn respond_after(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Number of transcribe calls observed so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TranscriptionBackend for MockTranscriber {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcribe(
        &self,
        _audio: &Path,
        _language_hint: Option<&str>,
        progress: ProgressFn,
    ) -> Result<Transcript, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.take_failure() {
            return Err(TranscriptionError::Backend("injected failure".to_string()));
        }

        let transcript = self.transcript.lock().clone();
        let total = transcript.segments.len().max(1);
        for done in 1..=total {
            progress(done as f32 / total as f32);
        }

        Ok(transcript)
    }

    async fn health_check(&self) -> Result<(), TranscriptionError> {
        Ok(())
    }

    async fn list_available_models(&self) -> Result<Vec<String>, TranscriptionError> {
        Ok(vec!["mock".to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_transcribe_shouldReportPerSegmentProgress() {
        let backend = MockTranscriber::with_transcript(Transcript {
            text: "a b".to_string(),
            segments: vec![
                TranscriptSegment { start_ms: 0, end_ms: 1000, text: "a".to_string() },
                TranscriptSegment { start_ms: 1000, end_ms: 2000, text: "b".to_string() },
            ],
            detected_language: "en".to_string(),
        });

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressFn = Arc::new(move |p| sink.lock().push(p));

        backend
            .transcribe(Path::new("/dev/null"), None, progress)
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec![0.5, 1.0]);
    }

    #[tokio::test]
    async fn test_transcribe_withInjectedFailure_shouldFailOnceThenRecover() {
        let backend = MockTranscriber::speaking("Hello world", "en");
        backend.fail_next(1);

        let progress: ProgressFn = Arc::new(|_| {});
        assert!(backend
            .transcribe(Path::new("/dev/null"), None, progress.clone())
            .await
            .is_err());
        assert!(backend
            .transcribe(Path::new("/dev/null"), None, progress)
            .await
            .is_ok());
    }
}
