/*!
 * Database entity models and DTOs.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data.
 */

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::transcription::{JobStatus, TranscriptionJob};

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Persisted transcription job record
///
/// Holds the job history as written to disk. Segment timing is not
/// persisted; the record keeps the flattened transcript text so job
/// history survives restarts without re-running recognition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identifier (UUID string)
    pub id: String,
    /// Media file the audio was taken from
    pub media_path: String,
    /// Recognition language hint, if one was given
    pub language_hint: Option<String>,
    /// Lifecycle status at the time of the last save
    pub status: JobStatus,
    /// Completed fraction, 0.0 to 1.0
    pub progress: f64,
    /// Flattened transcript text, present once the job is done
    pub transcript_text: Option<String>,
    /// Language the backend detected
    pub detected_language: Option<String>,
    /// Failure detail, present once the job failed
    pub error: Option<String>,
    /// Creation timestamp (ISO 8601)
    pub created_at: String,
    /// Last update timestamp (ISO 8601)
    pub updated_at: String,
}

impl JobRecord {
    /// Build a record from a live queue job.
    pub fn from_job(job: &TranscriptionJob) -> Self {
        Self {
            id: job.id.to_string(),
            media_path: job.media_path.to_string_lossy().into_owned(),
            language_hint: job.language_hint.clone(),
            status: job.status,
            progress: f64::from(job.progress),
            transcript_text: job.transcript.as_ref().map(|t| t.text.clone()),
            detected_language: job
                .transcript
                .as_ref()
                .map(|t| t.detected_language.clone()),
            error: job.error.clone(),
            created_at: job.created_at.to_rfc3339(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Whether the persisted job reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Done | JobStatus::Failed)
    }
}

/// Aggregate counts over persisted transcription jobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStats {
    /// Total persisted jobs
    pub total: i64,
    /// Jobs still waiting for a worker
    pub queued: i64,
    /// Jobs a worker was transcribing at last save
    pub running: i64,
    /// Jobs with a transcript
    pub done: i64,
    /// Jobs that failed, timed out or were cancelled
    pub failed: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_jobStatus_display_shouldReturnSnakeCase() {
        assert_eq!(JobStatus::Queued.to_string(), "queued");
        assert_eq!(JobStatus::Running.to_string(), "running");
        assert_eq!(JobStatus::Done.to_string(), "done");
        assert_eq!(JobStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_jobStatus_fromStr_shouldParseValidStrings() {
        assert_eq!("queued".parse::<JobStatus>().unwrap(), JobStatus::Queued);
        assert_eq!("DONE".parse::<JobStatus>().unwrap(), JobStatus::Done);
        assert!("resolved".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_jobRecord_serde_shouldUseLowercaseStatusStrings() {
        let record = JobRecord {
            id: "test-id".to_string(),
            media_path: "/media/show.mkv".to_string(),
            language_hint: Some("ja".to_string()),
            status: JobStatus::Done,
            progress: 1.0,
            transcript_text: Some("Hello".to_string()),
            detected_language: Some("en".to_string()),
            error: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "done");

        let back: JobRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.status, JobStatus::Done);
        assert_eq!(back.transcript_text.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_jobRecord_isTerminal_shouldBeTrueForDoneAndFailed() {
        let mut record = JobRecord {
            id: "test-id".to_string(),
            media_path: PathBuf::from("/media/show.mkv")
                .to_string_lossy()
                .into_owned(),
            language_hint: None,
            status: JobStatus::Queued,
            progress: 0.0,
            transcript_text: None,
            detected_language: None,
            error: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        };

        assert!(!record.is_terminal());

        record.status = JobStatus::Done;
        assert!(record.is_terminal());

        record.status = JobStatus::Failed;
        assert!(record.is_terminal());
    }
}
