/*!
 * # Subwarden - Subtitle Acquisition and Translation Pipeline
 *
 * A Rust library that gets a subtitle in the wanted language for every
 * item in a media library, preferring cheap local sources before falling
 * back to expensive ones.
 *
 * ## Features
 *
 * - Four-stage acquisition: embedded subtitle match, embedded subtitle
 *   translation, provider download, speech-to-text transcription
 * - Candidate scoring with language, format, release and uploader signals
 * - Provider reputation weighting and a cooldown circuit breaker
 * - LLM translation with a failover backend chain:
 *   - Ollama (local LLM)
 *   - OpenAI API
 *   - Anthropic API
 * - Context-aware batching with scene-break detection and glossaries
 * - Whisper-compatible transcription over HTTP with a bounded job queue
 * - SQLite persistence for job history, glossaries and provider health
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `pipeline`: Stage orchestration and the event channel
 * - `providers`: Subtitle provider trait, registry and batched search
 * - `scoring`: Candidate scoring engine and reputation cache
 * - `health`: Provider health tracking and the circuit breaker
 * - `translation`: Batch translation with context and glossaries:
 *   - `translation::backends`: Ollama, OpenAI and Anthropic clients
 *   - `translation::context`: Rolling context window assembly
 *   - `translation::glossary`: Term resolution across scopes
 * - `transcription`: Speech-to-text backends and the job queue
 * - `subtitle`: SRT parsing, serialization and document handling
 * - `media`: Media container inspection seam
 * - `database`: SQLite persistence layer
 * - `app_config`: Configuration management
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the library
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod database;
pub mod errors;
pub mod health;
pub mod language_utils;
pub mod media;
pub mod pipeline;
pub mod providers;
pub mod scoring;
pub mod subtitle;
pub mod transcription;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use database::Repository;
pub use errors::{ConfigurationError, ProviderError, TranscriptionError, TranslationBackendError};
pub use health::HealthTracker;
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use pipeline::{AcquisitionOutcome, AcquisitionPipeline, EventSender, LibraryItem, PipelineEvent};
pub use providers::{ProviderRegistry, SubtitleProvider};
pub use subtitle::SubtitleDocument;
pub use transcription::TranscriptionQueue;
pub use translation::TranslationManager;
