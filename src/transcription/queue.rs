/*!
 * Bounded transcription job queue.
 *
 * Jobs are accepted immediately and processed by spawned workers gated on
 * a semaphore, one permit per running transcription. Extracted audio lives
 * in a `NamedTempFile` owned by the worker, so the file is removed on
 * every exit path.
 */

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::app_config::TranscriptionConfig;
use crate::errors::TranscriptionError;
use crate::media::{select_audio_stream, MediaInspector};
use crate::pipeline::events::{EventSender, PipelineEvent};

use super::backend::{ProgressFn, TranscriptionBackend};
use super::{JobStatus, Transcript, TranscriptionJob};

/// Accepts transcription jobs and runs them with bounded concurrency.
pub struct TranscriptionQueue {
    /// The single active backend
    backend: Arc<dyn TranscriptionBackend>,
    /// Media inspection collaborator
    inspector: Arc<dyn MediaInspector>,
    /// All jobs the queue has seen, terminal ones included
    jobs: Arc<RwLock<HashMap<Uuid, TranscriptionJob>>>,
    /// One permit per running transcription
    semaphore: Arc<Semaphore>,
    /// Per-job timeout
    job_timeout: Duration,
    /// Event publisher
    events: EventSender,
}

impl TranscriptionQueue {
    /// Create a queue around the active backend.
    pub fn new(
        backend: Arc<dyn TranscriptionBackend>,
        inspector: Arc<dyn MediaInspector>,
        config: &TranscriptionConfig,
        events: EventSender,
    ) -> Self {
        Self {
            backend,
            inspector,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            job_timeout: Duration::from_secs(config.job_timeout_secs),
            events,
        }
    }

    /// Accept a job and return its id immediately. The job runs once a
    /// worker permit is available.
    pub fn enqueue(&self, media_path: PathBuf, language_hint: Option<String>) -> Uuid {
        let job = TranscriptionJob::new(media_path, language_hint);
        let job_id = job.id;

        info!("Queued transcription job {} for {}", job_id, job.media_path.display());
        self.jobs.write().insert(job_id, job);
        self.events.emit(PipelineEvent::TranscriptionQueued { job_id });

        let backend = self.backend.clone();
        let inspector = self.inspector.clone();
        let jobs = self.jobs.clone();
        let semaphore = self.semaphore.clone();
        let job_timeout = self.job_timeout;
        let events = self.events.clone();

        tokio::spawn(async move {
            Self::run(backend, inspector, jobs, semaphore, job_timeout, events, job_id).await;
        });

        job_id
    }

    /// Cancel a job. A queued job is removed cleanly and never runs; a
    /// running job finishes or times out on its own. Returns whether the
    /// cancellation took effect.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(&job_id) {
            Some(job) if job.status == JobStatus::Queued => {
                job.status = JobStatus::Failed;
                job.error = Some(TranscriptionError::Cancelled.to_string());
                self.events.emit(PipelineEvent::TranscriptionFailed {
                    job_id,
                    error: TranscriptionError::Cancelled.to_string(),
                });
                true
            }
            _ => false,
        }
    }

    /// Snapshot one job.
    pub fn get_job(&self, job_id: Uuid) -> Option<TranscriptionJob> {
        self.jobs.read().get(&job_id).cloned()
    }

    /// Snapshot every job, oldest first.
    pub fn list_jobs(&self) -> Vec<TranscriptionJob> {
        let mut jobs: Vec<TranscriptionJob> = self.jobs.read().values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    async fn run(
        backend: Arc<dyn TranscriptionBackend>,
        inspector: Arc<dyn MediaInspector>,
        jobs: Arc<RwLock<HashMap<Uuid, TranscriptionJob>>>,
        semaphore: Arc<Semaphore>,
        job_timeout: Duration,
        events: EventSender,
        job_id: Uuid,
    ) {
        let _permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        // Claim the job; a job cancelled while queued never runs.
        let (media_path, language_hint) = {
            let mut guard = jobs.write();
            match guard.get_mut(&job_id) {
                Some(job) if job.status == JobStatus::Queued => {
                    job.status = JobStatus::Running;
                    (job.media_path.clone(), job.language_hint.clone())
                }
                _ => return,
            }
        };

        let progress_jobs = jobs.clone();
        let progress_events = events.clone();
        let progress: ProgressFn = Arc::new(move |fraction| {
            if let Some(job) = progress_jobs.write().get_mut(&job_id) {
                job.progress = fraction;
            }
            progress_events.emit(PipelineEvent::TranscriptionProgress {
                job_id,
                progress: fraction,
            });
        });

        let outcome = Self::transcribe(
            backend,
            inspector,
            &media_path,
            language_hint.as_deref(),
            job_timeout,
            progress,
        )
        .await;

        let mut guard = jobs.write();
        let Some(job) = guard.get_mut(&job_id) else { return };

        match outcome {
            Ok(transcript) => {
                info!("Transcription job {} finished", job_id);
                job.status = JobStatus::Done;
                job.progress = 1.0;
                job.transcript = Some(transcript);
                events.emit(PipelineEvent::TranscriptionCompleted { job_id });
            }
            Err(e) => {
                warn!("Transcription job {} failed: {}", job_id, e);
                job.status = JobStatus::Failed;
                job.error = Some(e.to_string());
                events.emit(PipelineEvent::TranscriptionFailed {
                    job_id,
                    error: e.to_string(),
                });
            }
        }
    }

    /// Extract the audio track and run the backend against it. The temp
    /// audio file is owned by this scope and removed when it returns,
    /// whether with a transcript, an error or a timeout.
    async fn transcribe(
        backend: Arc<dyn TranscriptionBackend>,
        inspector: Arc<dyn MediaInspector>,
        media_path: &std::path::Path,
        language_hint: Option<&str>,
        job_timeout: Duration,
        progress: ProgressFn,
    ) -> Result<Transcript, TranscriptionError> {
        let streams = inspector
            .list_streams(media_path)
            .await
            .map_err(|e| TranscriptionError::AudioExtraction(e.to_string()))?;

        let stream = select_audio_stream(&streams, language_hint)
            .map_err(|e| TranscriptionError::AudioExtraction(e.to_string()))?;

        let audio = inspector
            .extract_audio(media_path, stream.index)
            .await
            .map_err(|e| TranscriptionError::AudioExtraction(e.to_string()))?;

        tokio::time::timeout(
            job_timeout,
            backend.transcribe(audio.path(), language_hint, progress),
        )
        .await
        .map_err(|_| TranscriptionError::Timeout(job_timeout.as_secs()))?
    }
}
