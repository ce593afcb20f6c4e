/*!
 * Error types for the subwarden pipeline.
 *
 * This module contains custom error types for different parts of the
 * acquisition pipeline, using the thiserror crate for ergonomic error
 * definitions.
 *
 * Note on the taxonomy: a disabled provider is NOT an error. The ranking
 * step silently skips providers the health tracker reports as unavailable,
 * so there is no `ProviderDisabled` variant here on purpose.
 */

use thiserror::Error;

/// Errors that can occur when talking to a subtitle search provider.
///
/// These are transient by design: the pipeline records them in the health
/// tracker and moves on to the next candidate or provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// The provider did not answer within the per-provider search timeout
    #[error("Provider timed out after {0} ms")]
    Timeout(u64),

    /// Error downloading a candidate subtitle
    #[error("Download failed for candidate {candidate_id}: {message}")]
    DownloadFailed {
        /// Opaque candidate id the download was attempted for
        candidate_id: String,
        /// Failure detail
        message: String,
    },

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Errors raised by a translation backend.
///
/// These advance the backend fallback chain inside the translation manager;
/// only when every configured backend has failed does the batch itself fail.
#[derive(Error, Debug)]
pub enum TranslationBackendError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// The backend did not answer within its configured timeout
    #[error("Backend timed out after {0} ms")]
    Timeout(u64),

    /// The backend answered with a different number of lines than requested
    #[error("Backend returned {got} lines, expected {expected}")]
    LineCountMismatch {
        /// Number of lines the backend returned
        got: usize,
        /// Number of lines in the batch
        expected: usize,
    },

    /// Every backend in the chain has been tried and failed
    #[error("All translation backends failed: {0}")]
    ChainExhausted(String),
}

/// Errors raised by the transcription stage.
///
/// These abort stage D only and are never retried internally: a failing
/// active backend is assumed broken until reconfigured.
#[derive(Error, Debug)]
pub enum TranscriptionError {
    /// Failure selecting or extracting the audio track from the source media
    #[error("Audio extraction failed: {0}")]
    AudioExtraction(String),

    /// Error reported by the transcription backend
    #[error("Transcription backend error: {0}")]
    Backend(String),

    /// The job exceeded its configured timeout
    #[error("Transcription timed out after {0} s")]
    Timeout(u64),

    /// The job was cancelled before it started running
    #[error("Transcription job was cancelled")]
    Cancelled,
}

/// Configuration errors fail fast and are surfaced immediately,
/// never silently retried.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// A required configuration value is missing or empty
    #[error("Missing configuration value: {0}")]
    Missing(String),

    /// A configuration value is outside its allowed range
    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Name of the offending field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// A provider or backend type name is not known to the registry
    #[error("Unknown {kind} type: {name}")]
    UnknownKind {
        /// "provider", "translation backend" or "transcription backend"
        kind: String,
        /// The unrecognized name
        name: String,
    },
}
