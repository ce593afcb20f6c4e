/*!
 * Translation backend implementations.
 *
 * This module contains the common `TranslationBackend` trait and client
 * implementations for the supported backend types:
 * - Ollama: local LLM server
 * - OpenAI: OpenAI-compatible API
 * - Anthropic: Anthropic API
 * - Mock: in-process backend for tests
 *
 * Backends form an ordered fallback chain inside the translation manager;
 * they are resolved by configured type name, never by inheritance.
 */

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::app_config::{BackendEntry, BackendKind, TranslationConfig};
use crate::errors::{ConfigurationError, TranslationBackendError};

use super::TranslationBatch;

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;

/// Common trait for all translation backends.
#[async_trait]
pub trait TranslationBackend: Send + Sync + Debug {
    /// Display name used in logs and the diagnostic trail
    fn name(&self) -> &str;

    /// Per-request timeout the manager enforces around `translate_batch`
    fn timeout(&self) -> Duration;

    /// Translate one batch, returning exactly one line per input line.
    async fn translate_batch(
        &self,
        batch: &TranslationBatch,
    ) -> Result<Vec<String>, TranslationBackendError>;
}

/// Build the ordered backend chain from configuration.
///
/// The chain must not be empty; unknown backend kinds cannot occur since
/// the kind is a closed enum, but missing credentials fail fast here.
pub fn build_chain(
    config: &TranslationConfig,
) -> Result<Vec<Arc<dyn TranslationBackend>>, ConfigurationError> {
    if config.backends.is_empty() {
        return Err(ConfigurationError::Missing("translation.backends".to_string()));
    }

    let mut chain: Vec<Arc<dyn TranslationBackend>> = Vec::with_capacity(config.backends.len());

    for entry in &config.backends {
        let backend: Arc<dyn TranslationBackend> = match entry.kind {
            BackendKind::Ollama => Arc::new(ollama::OllamaBackend::from_entry(entry)?),
            BackendKind::OpenAI => Arc::new(openai::OpenAIBackend::from_entry(entry)?),
            BackendKind::Anthropic => Arc::new(anthropic::AnthropicBackend::from_entry(entry)?),
            BackendKind::Mock => Arc::new(mock::MockBackend::new()),
        };
        chain.push(backend);
    }

    Ok(chain)
}

/// Validate a backend entry that requires an API key.
pub(crate) fn require_api_key(entry: &BackendEntry) -> Result<String, ConfigurationError> {
    if entry.api_key.trim().is_empty() {
        return Err(ConfigurationError::Missing(format!(
            "translation.backends[{}].api_key",
            entry.kind
        )));
    }
    Ok(entry.api_key.clone())
}
