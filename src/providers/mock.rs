/*!
 * Mock subtitle provider for testing.
 *
 * Returns predetermined candidates and payloads without any network access,
 * with per-call failure injection so tests can drive the health tracker and
 * the stage-C retry ladder.
 */

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::app_config::ProviderEntry;
use crate::errors::ProviderError;

use super::{CandidateFlags, SubtitleCandidate, SubtitleProvider, SubtitleQuery};

/// Mock provider with canned search results and scripted failures.
#[derive(Debug)]
pub struct MockProvider {
    /// Registry name; defaults to "mock" but can be overridden so tests can
    /// register several instances side by side
    name: String,

    /// Tie-break priority
    priority: u32,

    /// Candidates returned by every search
    candidates: Mutex<Vec<SubtitleCandidate>>,

    /// Payload returned by download, keyed by candidate id
    payloads: Mutex<HashMap<String, Bytes>>,

    /// Number of searches that should fail before succeeding
    fail_searches: AtomicUsize,

    /// Number of downloads that should fail before succeeding
    fail_downloads: AtomicUsize,

    /// Count of search calls made
    search_calls: AtomicUsize,

    /// Count of download calls made
    download_calls: AtomicUsize,
}

impl MockProvider {
    /// Create an empty mock provider.
    pub fn new(name: &str, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            candidates: Mutex::new(Vec::new()),
            payloads: Mutex::new(HashMap::new()),
            fail_searches: AtomicUsize::new(0),
            fail_downloads: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
        }
    }

    /// Build from a config entry (name fixed to "mock").
    pub fn from_entry(entry: &ProviderEntry) -> Self {
        Self::new("mock", entry.priority)
    }

    /// Add a candidate that every search will return, with its payload.
    pub fn add_candidate(&self, candidate: SubtitleCandidate, payload: &str) {
        self.payloads
            .lock()
            .unwrap()
            .insert(candidate.id.clone(), Bytes::from(payload.to_string()));
        self.candidates.lock().unwrap().push(candidate);
    }

    /// Make the next `count` searches fail with a request error.
    pub fn fail_next_searches(&self, count: usize) {
        self.fail_searches.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` downloads fail.
    pub fn fail_next_downloads(&self, count: usize) {
        self.fail_downloads.store(count, Ordering::SeqCst);
    }

    /// Number of search calls made so far.
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Number of download calls made so far.
    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    /// Convenience constructor for a plain candidate.
    pub fn candidate(provider: &str, id: &str, language: &str) -> SubtitleCandidate {
        SubtitleCandidate {
            provider: provider.to_string(),
            id: id.to_string(),
            language: language.to_string(),
            format: "srt".to_string(),
            release_name: String::new(),
            uploader_trusted: false,
            machine_translated: false,
            mt_confidence: 0,
            flags: CandidateFlags::default(),
        }
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl SubtitleProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn config_fields(&self) -> &'static [&'static str] {
        &[]
    }

    async fn search(&self, _query: &SubtitleQuery) -> Result<Vec<SubtitleCandidate>, ProviderError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);

        if Self::take_failure(&self.fail_searches) {
            return Err(ProviderError::RequestFailed("mock search failure".to_string()));
        }

        Ok(self.candidates.lock().unwrap().clone())
    }

    async fn download(&self, candidate_id: &str) -> Result<Bytes, ProviderError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);

        if Self::take_failure(&self.fail_downloads) {
            return Err(ProviderError::DownloadFailed {
                candidate_id: candidate_id.to_string(),
                message: "mock download failure".to_string(),
            });
        }

        self.payloads
            .lock()
            .unwrap()
            .get(candidate_id)
            .cloned()
            .ok_or_else(|| ProviderError::DownloadFailed {
                candidate_id: candidate_id.to_string(),
                message: "unknown candidate id".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_afterFailNextSearches_shouldFailThenRecover() {
        let provider = MockProvider::new("mock", 1);
        provider.add_candidate(MockProvider::candidate("mock", "c1", "en"), "payload");
        provider.fail_next_searches(1);

        let query = SubtitleQuery::default();
        assert!(provider.search(&query).await.is_err());
        assert_eq!(provider.search(&query).await.unwrap().len(), 1);
        assert_eq!(provider.search_calls(), 2);
    }

    #[tokio::test]
    async fn test_download_withUnknownId_shouldFail() {
        let provider = MockProvider::new("mock", 1);
        assert!(provider.download("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_download_withKnownId_shouldReturnPayload() {
        let provider = MockProvider::new("mock", 1);
        provider.add_candidate(MockProvider::candidate("mock", "c1", "en"), "1\n00:00:00,000 --> 00:00:01,000\nHi\n");

        let bytes = provider.download("c1").await.unwrap();
        assert!(!bytes.is_empty());
    }
}
