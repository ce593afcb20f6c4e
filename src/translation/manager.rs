/*!
 * Ordered-chain translation manager.
 *
 * Every batch walks the configured backend chain first to last. A backend
 * that fails or exceeds its timeout passes the batch to the next one; only
 * a chain where every backend failed is an error. Chain exhaustion may be
 * retried at the pipeline level, reusing the already-assembled context.
 */

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::app_config::Config;
use crate::errors::{ConfigurationError, TranslationBackendError};
use crate::subtitle::SubtitleDocument;

use super::backends::{self, TranslationBackend};
use super::context::{BatchContext, ContextAssembler};
use super::glossary::{GlossaryEntry, GlossaryResolver};
use super::TranslationBatch;

/// Walks the ordered backend chain for each translation batch.
pub struct TranslationManager {
    /// Ordered backend chain, tried first to last
    chain: Vec<Arc<dyn TranslationBackend>>,
    /// Context window assembler, shared across batches of a document
    assembler: ContextAssembler,
    /// Glossary merger
    resolver: GlossaryResolver,
    /// Lines per batch
    batch_size: usize,
    /// Chain re-walks after the whole chain failed for a batch
    max_batch_retries: u32,
}

impl TranslationManager {
    /// Build a manager from configuration, constructing the backend chain.
    pub fn from_config(config: &Config) -> Result<Self, ConfigurationError> {
        let chain = backends::build_chain(&config.translation)?;
        Ok(Self::with_chain(chain, config))
    }

    /// Build a manager around an existing chain. Used by tests and by
    /// callers that construct backends themselves.
    pub fn with_chain(chain: Vec<Arc<dyn TranslationBackend>>, config: &Config) -> Self {
        Self {
            chain,
            assembler: ContextAssembler::new(config.context.clone()),
            resolver: GlossaryResolver::new(config.glossary.max_entries),
            batch_size: config.translation.batch_size.max(1),
            max_batch_retries: config.translation.max_batch_retries,
        }
    }

    /// Translate one batch of lines with its context and glossary.
    ///
    /// Walks the chain once per attempt; context and glossary are computed
    /// by the caller and reused unchanged across attempts.
    pub async fn translate_batch(
        &self,
        lines: &[String],
        context: &BatchContext,
        glossary: &[GlossaryEntry],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>, TranslationBackendError> {
        let mut batch = TranslationBatch {
            lines: lines.to_vec(),
            context_before: context.before.clone(),
            context_after: context.after.clone(),
            glossary: glossary.to_vec(),
            attempt: 0,
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
        };

        loop {
            match self.walk_chain(&batch).await {
                Ok(translated) => return Ok(translated),
                Err(summary) => {
                    if batch.attempt >= self.max_batch_retries {
                        return Err(TranslationBackendError::ChainExhausted(summary));
                    }
                    warn!(
                        "Translation chain exhausted on attempt {}, retrying batch of {} lines",
                        batch.attempt + 1,
                        batch.lines.len()
                    );
                    batch = batch.next_attempt();
                }
            }
        }
    }

    /// Walk the chain once. Returns the per-backend failure summary when
    /// every backend failed.
    async fn walk_chain(&self, batch: &TranslationBatch) -> Result<Vec<String>, String> {
        let mut failures: Vec<String> = Vec::with_capacity(self.chain.len());

        for backend in &self.chain {
            let outcome =
                tokio::time::timeout(backend.timeout(), backend.translate_batch(batch)).await;

            match outcome {
                Ok(Ok(translated)) => {
                    debug!(
                        "Backend {} translated {} lines (attempt {})",
                        backend.name(),
                        batch.lines.len(),
                        batch.attempt
                    );
                    return Ok(translated);
                }
                Ok(Err(e)) => {
                    warn!("Backend {} failed: {}", backend.name(), e);
                    failures.push(format!("{}: {}", backend.name(), e));
                }
                Err(_) => {
                    let timeout_ms = backend.timeout().as_millis() as u64;
                    warn!("Backend {} timed out after {} ms", backend.name(), timeout_ms);
                    failures.push(format!(
                        "{}: {}",
                        backend.name(),
                        TranslationBackendError::Timeout(timeout_ms)
                    ));
                }
            }
        }

        Err(failures.join("; "))
    }

    /// Translate a whole document, batching lines and assembling a context
    /// window per batch. Returns a new document in the target language with
    /// the original timing.
    pub async fn translate_document(
        &self,
        document: &SubtitleDocument,
        target_language: &str,
        global_glossary: &[GlossaryEntry],
        series_glossary: &[GlossaryEntry],
    ) -> Result<SubtitleDocument> {
        if document.lines.is_empty() {
            return document.with_translated_texts(Vec::new(), target_language);
        }

        let glossary = self.resolver.merge(global_glossary, series_glossary);
        let texts: Vec<String> = document.lines.iter().map(|l| l.text.clone()).collect();

        info!(
            "Translating {} lines from {} to {} in batches of {}",
            texts.len(),
            document.language,
            target_language,
            self.batch_size
        );

        let mut translated: Vec<String> = Vec::with_capacity(texts.len());

        for start in (0..texts.len()).step_by(self.batch_size) {
            let end = (start + self.batch_size).min(texts.len());
            let context = self.assembler.assemble(&document.lines, start..end);

            let batch_result = self
                .translate_batch(
                    &texts[start..end],
                    &context,
                    &glossary,
                    &document.language,
                    target_language,
                )
                .await
                .with_context(|| {
                    format!("Failed to translate lines {}-{}", start + 1, end)
                })?;

            translated.extend(batch_result);
        }

        document.with_translated_texts(translated, target_language)
    }
}
