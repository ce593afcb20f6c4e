/*!
 * Subtitle search provider implementations.
 *
 * This module contains the common `SubtitleProvider` trait, the name-keyed
 * registry the pipeline resolves configured providers through, and the
 * provider implementations:
 * - OpenSubtitles-style REST provider
 * - Mock provider for tests
 */

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::app_config::ProviderEntry;
use crate::errors::{ConfigurationError, ProviderError};

pub mod mock;
pub mod opensubtitles;
pub mod search;

/// Flags a provider can attach to a candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFlags {
    /// Forced (foreign-parts-only) subtitle
    pub forced: bool,

    /// Hearing-impaired/SDH subtitle
    pub hearing_impaired: bool,
}

/// A subtitle search result. Immutable once produced by a provider query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleCandidate {
    /// Name of the provider that produced this candidate
    pub provider: String,

    /// Opaque, provider-scoped subtitle id used for download
    pub id: String,

    /// Language code of the subtitle text
    pub language: String,

    /// Subtitle format (e.g. "srt", "ass")
    pub format: String,

    /// Release name the subtitle was made for
    pub release_name: String,

    /// Whether the provider marks the uploader as trusted
    pub uploader_trusted: bool,

    /// Whether the provider flags this subtitle as machine-translated
    pub machine_translated: bool,

    /// Machine-translation confidence (0-100): how likely this candidate
    /// is itself a machine translation rather than an original
    pub mt_confidence: u8,

    /// Candidate flags
    #[serde(default)]
    pub flags: CandidateFlags,
}

/// A search query describing the library item a subtitle is wanted for.
#[derive(Debug, Clone, Default)]
pub struct SubtitleQuery {
    /// Title of the movie or series
    pub title: String,

    /// Release year, if known
    pub year: Option<i32>,

    /// Season number for series episodes
    pub season: Option<u32>,

    /// Episode number for series episodes
    pub episode: Option<u32>,

    /// Desired subtitle language code
    pub language: String,

    /// Release group of the local media file, if known
    pub release_group: Option<String>,
}

/// Common trait for all subtitle search providers.
///
/// Implementations are registered by name and resolved from configuration;
/// polymorphism is trait-object based, never inheritance-like.
#[async_trait]
pub trait SubtitleProvider: Send + Sync + Debug {
    /// Registry name of this provider
    fn name(&self) -> &str;

    /// Configured tie-break priority; lower wins on equal scores
    fn priority(&self) -> u32;

    /// Names of the settings keys this provider understands
    fn config_fields(&self) -> &'static [&'static str];

    /// Search for subtitle candidates matching the query
    async fn search(&self, query: &SubtitleQuery) -> Result<Vec<SubtitleCandidate>, ProviderError>;

    /// Download the raw subtitle bytes for a candidate id
    async fn download(&self, candidate_id: &str) -> Result<Bytes, ProviderError>;
}

/// Name-keyed registry of configured providers.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SubtitleProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Build a registry from configuration entries.
    ///
    /// Unknown provider names fail fast with a configuration error.
    pub fn from_config(entries: &[ProviderEntry]) -> Result<Self, ConfigurationError> {
        let mut registry = Self::new();

        for entry in entries.iter().filter(|e| e.enabled) {
            let provider: Arc<dyn SubtitleProvider> = match entry.name.as_str() {
                "opensubtitles" => Arc::new(opensubtitles::OpenSubtitles::from_entry(entry)?),
                "mock" => Arc::new(mock::MockProvider::from_entry(entry)),
                other => {
                    return Err(ConfigurationError::UnknownKind {
                        kind: "provider".to_string(),
                        name: other.to_string(),
                    });
                }
            };
            registry.register(provider);
        }

        Ok(registry)
    }

    /// Register a provider under its own name.
    pub fn register(&mut self, provider: Arc<dyn SubtitleProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn SubtitleProvider>> {
        self.providers.get(name).cloned()
    }

    /// All registered providers.
    pub fn all(&self) -> Vec<Arc<dyn SubtitleProvider>> {
        self.providers.values().cloned().collect()
    }

    /// Configured tie-break priorities keyed by provider name.
    pub fn priorities(&self) -> HashMap<String, u32> {
        self.providers
            .iter()
            .map(|(name, provider)| (name.clone(), provider.priority()))
            .collect()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
