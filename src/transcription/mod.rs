/*!
 * Speech-to-text fallback.
 *
 * One ACTIVE transcription backend serves the whole queue. There is no
 * fallback chain here: when the backend is broken the stage fails and
 * switching to another backend is a configuration change. The queue bounds
 * concurrency with a semaphore and publishes progress through the pipeline
 * event channel.
 */

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod backend;
pub mod mock;
mod queue;

pub use backend::{TranscriptionBackend, WhisperHttp};
pub use mock::MockTranscriber;
pub use queue::TranscriptionQueue;

/// One timed segment of recognized speech.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    /// Segment start in milliseconds
    pub start_ms: u64,

    /// Segment end in milliseconds
    pub end_ms: u64,

    /// Recognized text
    pub text: String,
}

/// Result of transcribing one audio track.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    /// Full recognized text
    pub text: String,

    /// Timed segments, chronological
    pub segments: Vec<TranscriptSegment>,

    /// Language the backend detected (ISO code)
    pub detected_language: String,
}

/// Lifecycle of a transcription job. Done and Failed are terminal.
/// The serde form matches the lowercase strings stored in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting for a worker permit
    Queued,
    /// A worker is transcribing
    Running,
    /// Transcript available
    Done,
    /// Backend error, timeout or cancellation
    Failed,
}

/// A transcription job as observed through the queue. Mutated only by its
/// owning worker.
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    /// Job id
    pub id: Uuid,

    /// Media file the audio is taken from
    pub media_path: PathBuf,

    /// Preferred audio-track language, used for track selection and
    /// passed to the backend as a recognition hint
    pub language_hint: Option<String>,

    /// Current lifecycle status
    pub status: JobStatus,

    /// Completed fraction, 0.0 to 1.0
    pub progress: f32,

    /// Transcript, present once the job is Done
    pub transcript: Option<Transcript>,

    /// Failure detail, present once the job is Failed
    pub error: Option<String>,

    /// When the job was accepted
    pub created_at: DateTime<Utc>,
}

impl TranscriptionJob {
    fn new(media_path: PathBuf, language_hint: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            media_path,
            language_hint,
            status: JobStatus::Queued,
            progress: 0.0,
            transcript: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the job can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Done | JobStatus::Failed)
    }
}
