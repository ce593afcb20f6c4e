/*!
 * In-process translation backend for tests.
 *
 * Returns scripted translations when one is registered for a line, and a
 * deterministic `[lang] text` rendition otherwise. Failures and delays
 * can be injected per call to exercise chain fallback and timeouts.
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::TranslationBackendError;
use crate::translation::TranslationBatch;

use super::TranslationBackend;

/// Scripted translation backend for tests.
#[derive(Debug, Default)]
pub struct MockBackend {
    /// Display name, distinguishable when several mocks form a chain
    name: String,

    /// Scripted source-line to translated-line mappings
    translations: Mutex<HashMap<String, String>>,

    /// Number of upcoming calls that fail
    fail_next: AtomicUsize,

    /// Artificial delay before responding
    delay: Mutex<Option<Duration>>,

    /// Number of translate_batch calls observed
    calls: AtomicUsize,
}

impl MockBackend {
    /// Create a backend named "mock".
    pub fn new() -> Self {
        Self::named("mock")
    }

    /// Create a backend with a custom display name.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Register a scripted translation for an exact source line.
    pub fn script(&self, source: &str, translated: &str) {
        self.translations
            .lock()
            .insert(source.to_string(), translated.to_string());
    }

    /// Make the next `count` calls fail.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Delay every response by `delay`, for timeout tests.
    pub fn respond_after(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Number of translate_batch calls observed so far.
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
impl TranslationBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn translate_batch(
        &self,
        batch: &TranslationBatch,
    ) -> Result<Vec<String>, TranslationBackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.take_failure() {
            return Err(TranslationBackendError::RequestFailed(format!(
                "{}: injected failure",
                self.name
            )));
        }

        let translations = self.translations.lock();
        Ok(batch
            .lines
            .iter()
            .map(|line| match translations.get(line) {
                Some(translated) => translated.clone(),
                None => format!("[{}] {}", batch.target_language, line),
            })
            .collect())
    }
}
