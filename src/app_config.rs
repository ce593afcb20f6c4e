/*!
 * Application configuration.
 *
 * This module handles the pipeline configuration including loading,
 * validating and saving configuration settings. Every tunable the scoring
 * engine, health tracker, context assembler, translation chain and
 * transcription queue consume lives here; none of them read ambient state.
 */

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;

/// Top-level pipeline configuration.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Target language code (ISO) every library item should end up with
    pub target_language: String,

    /// Preferred source languages for stage B, in order of preference
    #[serde(default)]
    pub preferred_source_languages: Vec<String>,

    /// Candidate scoring tunables
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Provider/backend health tracking tunables
    #[serde(default)]
    pub health: HealthConfig,

    /// Context window tunables
    #[serde(default)]
    pub context: ContextConfig,

    /// Glossary merge tunables
    #[serde(default)]
    pub glossary: GlossaryConfig,

    /// Ordered translation backend chain
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Transcription queue and active backend
    #[serde(default)]
    pub transcription: TranscriptionConfig,

    /// Subtitle search providers
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,

    /// Pipeline-level attempt bounds and timeouts
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Scoring weights and modifiers for ranking subtitle candidates.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScoringConfig {
    /// Score for an exact language match, region included
    #[serde(default = "default_language_exact_score")]
    pub language_exact_score: i32,

    /// Score for a language match ignoring the region suffix
    #[serde(default = "default_language_base_score")]
    pub language_base_score: i32,

    /// Preferred subtitle format (e.g. "srt")
    #[serde(default = "default_preferred_format")]
    pub preferred_format: String,

    /// Bonus when the candidate format equals the preferred format
    #[serde(default = "default_format_match_score")]
    pub format_match_score: i32,

    /// Bonus when the release group from the query appears in the release name
    #[serde(default = "default_release_match_score")]
    pub release_match_score: i32,

    /// Bonus for candidates from uploaders the provider marks as trusted
    #[serde(default = "default_uploader_trust_bonus")]
    pub uploader_trust_bonus: i32,

    /// Machine-translation penalty; 0 disables the feature entirely
    #[serde(default = "default_mt_penalty")]
    pub mt_penalty: i32,

    /// Machine-translation confidence threshold (0-100)
    #[serde(default = "default_mt_confidence_threshold")]
    pub mt_confidence_threshold: u8,

    /// TTL in seconds for the cached provider-reputation aggregate
    #[serde(default = "default_reputation_ttl_secs")]
    pub reputation_ttl_secs: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            language_exact_score: default_language_exact_score(),
            language_base_score: default_language_base_score(),
            preferred_format: default_preferred_format(),
            format_match_score: default_format_match_score(),
            release_match_score: default_release_match_score(),
            uploader_trust_bonus: default_uploader_trust_bonus(),
            mt_penalty: default_mt_penalty(),
            mt_confidence_threshold: default_mt_confidence_threshold(),
            reputation_ttl_secs: default_reputation_ttl_secs(),
        }
    }
}

/// Health tracking and circuit breaker tunables.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthConfig {
    /// Minimum recorded outcomes before the breaker may open
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,

    /// Success-rate floor (0.0-1.0) below which the breaker opens
    #[serde(default = "default_success_rate_floor")]
    pub success_rate_floor: f64,

    /// Cooldown in seconds before an open breaker becomes eligible again
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            success_rate_floor: default_success_rate_floor(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

/// Context window tunables for translation batches.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContextConfig {
    /// Lines of surrounding dialogue to include in each direction (0-10)
    #[serde(default = "default_context_window_size")]
    pub window_size: usize,

    /// Gap in milliseconds treated as a scene break
    #[serde(default = "default_scene_break_ms")]
    pub scene_break_ms: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window_size: default_context_window_size(),
            scene_break_ms: default_scene_break_ms(),
        }
    }
}

/// Glossary merge tunables.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GlossaryConfig {
    /// Cap on merged glossary entries handed to a prompt
    #[serde(default = "default_glossary_max_entries")]
    pub max_entries: usize,
}

impl Default for GlossaryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_glossary_max_entries(),
        }
    }
}

/// Translation backend type.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Ollama local LLM server
    Ollama,
    /// OpenAI-compatible API
    OpenAI,
    /// Anthropic API
    Anthropic,
    /// In-process mock, for tests
    Mock,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Mock => "mock",
        };
        write!(f, "{}", name)
    }
}

/// A single entry in the ordered translation backend chain.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendEntry {
    /// Backend type
    #[serde(rename = "type")]
    pub kind: BackendKind,

    /// Model name
    #[serde(default = "String::new")]
    pub model: String,

    /// Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    /// API key
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of retry attempts within this backend
    #[serde(default = "default_backend_retry_count")]
    pub retry_count: u32,

    /// Base backoff time in milliseconds for exponential backoff
    #[serde(default = "default_backend_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Translation chain configuration.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Ordered backend chain, tried first to last per batch
    #[serde(default)]
    pub backends: Vec<BackendEntry>,

    /// Lines per translation batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pipeline-level retries for a batch whose whole chain failed
    #[serde(default = "default_max_batch_retries")]
    pub max_batch_retries: u32,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            batch_size: default_batch_size(),
            max_batch_retries: default_max_batch_retries(),
        }
    }
}

/// Transcription queue configuration. One active backend, no fallback chain:
/// switching backend is a configuration change, not automatic failover.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranscriptionConfig {
    /// Backend endpoint URL
    #[serde(default = "default_transcription_endpoint")]
    pub endpoint: String,

    /// Model name for the active backend
    #[serde(default = "default_transcription_model")]
    pub model: String,

    /// Maximum number of jobs running simultaneously
    #[serde(default = "default_max_concurrent_transcriptions")]
    pub max_concurrent: usize,

    /// Per-job timeout in seconds
    #[serde(default = "default_transcription_timeout_secs")]
    pub job_timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_transcription_endpoint(),
            model: default_transcription_model(),
            max_concurrent: default_max_concurrent_transcriptions(),
            job_timeout_secs: default_transcription_timeout_secs(),
        }
    }
}

/// A configured subtitle search provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderEntry {
    /// Registry name of the provider implementation
    pub name: String,

    /// Tie-break priority; lower wins
    #[serde(default = "default_provider_priority")]
    pub priority: u32,

    /// Whether the provider takes part in searches at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Provider-specific settings (API keys, endpoints)
    #[serde(default)]
    pub settings: std::collections::HashMap<String, String>,
}

/// Pipeline-level attempt bounds.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Download attempts in stage C before giving up on providers
    #[serde(default = "default_max_download_attempts")]
    pub max_download_attempts: u32,

    /// Per-provider search timeout in seconds
    #[serde(default = "default_search_timeout_secs")]
    pub search_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_download_attempts: default_max_download_attempts(),
            search_timeout_secs: default_search_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration, failing fast on the first problem.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.target_language.trim().is_empty() {
            return Err(ConfigurationError::Missing("target_language".to_string()));
        }

        if self.context.window_size > 10 {
            return Err(ConfigurationError::Invalid {
                field: "context.window_size".to_string(),
                reason: format!("must be 0-10, got {}", self.context.window_size),
            });
        }

        if !(0.0..=1.0).contains(&self.health.success_rate_floor) {
            return Err(ConfigurationError::Invalid {
                field: "health.success_rate_floor".to_string(),
                reason: format!("must be within 0.0-1.0, got {}", self.health.success_rate_floor),
            });
        }

        if self.transcription.max_concurrent == 0 {
            return Err(ConfigurationError::Invalid {
                field: "transcription.max_concurrent".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.translation.batch_size == 0 {
            return Err(ConfigurationError::Invalid {
                field: "translation.batch_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.pipeline.max_download_attempts == 0 {
            return Err(ConfigurationError::Invalid {
                field: "pipeline.max_download_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        for entry in &self.providers {
            if entry.name.trim().is_empty() {
                return Err(ConfigurationError::Missing("providers[].name".to_string()));
            }
        }

        Ok(())
    }
}

// Default value functions

fn default_language_exact_score() -> i32 {
    60
}

fn default_language_base_score() -> i32 {
    40
}

fn default_preferred_format() -> String {
    "srt".to_string()
}

fn default_format_match_score() -> i32 {
    10
}

fn default_release_match_score() -> i32 {
    20
}

fn default_uploader_trust_bonus() -> i32 {
    5
}

fn default_mt_penalty() -> i32 {
    15
}

fn default_mt_confidence_threshold() -> u8 {
    80
}

fn default_reputation_ttl_secs() -> u64 {
    60
}

fn default_min_samples() -> u64 {
    10
}

fn default_success_rate_floor() -> f64 {
    0.3
}

fn default_cooldown_secs() -> u64 {
    1800
}

fn default_context_window_size() -> usize {
    3
}

fn default_scene_break_ms() -> u64 {
    5000
}

fn default_glossary_max_entries() -> usize {
    30
}

fn default_backend_timeout_secs() -> u64 {
    60
}

fn default_backend_retry_count() -> u32 {
    2
}

fn default_backend_backoff_ms() -> u64 {
    1000
}

fn default_batch_size() -> usize {
    10
}

fn default_max_batch_retries() -> u32 {
    2
}

fn default_transcription_endpoint() -> String {
    "http://localhost:9000".to_string()
}

fn default_transcription_model() -> String {
    "base".to_string()
}

fn default_max_concurrent_transcriptions() -> usize {
    1
}

fn default_transcription_timeout_secs() -> u64 {
    1800
}

fn default_provider_priority() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_max_download_attempts() -> u32 {
    3
}

fn default_search_timeout_secs() -> u64 {
    30
}
