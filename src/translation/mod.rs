/*!
 * Context-aware multi-backend translation.
 *
 * The translation manager walks an ordered backend chain per batch,
 * building prompts from the glossary block, the surrounding-dialogue
 * context and the target lines. Context is computed once per batch; a
 * retry rebuilds only the backend-attempt index and reuses it.
 */

pub mod backends;
mod context;
mod glossary;
mod manager;
pub mod prompts;

pub use context::{BatchContext, ContextAssembler, ContextLine};
pub use glossary::{GlossaryEntry, GlossaryResolver, GlossaryScope};
pub use manager::TranslationManager;

/// A unit of translation work handed to the backend chain.
///
/// Built fresh per batch and never mutated after a backend attempt starts:
/// a retry produces a new value with only the attempt index advanced,
/// reusing the already-computed context and glossary.
#[derive(Debug, Clone)]
pub struct TranslationBatch {
    /// Ordered target lines to translate
    pub lines: Vec<String>,

    /// Dialogue lines preceding the batch, for context only
    pub context_before: Vec<ContextLine>,

    /// Dialogue lines following the batch, for context only
    pub context_after: Vec<ContextLine>,

    /// Resolved glossary entries to enforce
    pub glossary: Vec<GlossaryEntry>,

    /// Backend-attempt index, advanced on pipeline-level retries
    pub attempt: u32,

    /// Source language code
    pub source_language: String,

    /// Target language code
    pub target_language: String,
}

impl TranslationBatch {
    /// Produce the retry value: same lines, same context, same glossary,
    /// attempt index advanced by one.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}
