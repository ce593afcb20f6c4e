/*!
 * Fire-and-forget progress events.
 *
 * Pipeline stages and the transcription queue publish events through an
 * unbounded channel. Publishing never blocks and never fails the pipeline:
 * a dropped or absent receiver silently discards events.
 */

use std::path::PathBuf;

use log::trace;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{Stage, SubtitleSource};

/// An observable pipeline event. At most one event is published per
/// logical occurrence.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A pipeline stage started for an item
    StageStarted {
        /// Media path of the item
        item: PathBuf,
        /// Stage being attempted
        stage: Stage,
    },

    /// A pipeline stage failed; the pipeline moves on to the next stage
    StageFailed {
        /// Media path of the item
        item: PathBuf,
        /// Stage that failed
        stage: Stage,
        /// Failure detail
        error: String,
    },

    /// A ranked candidate was downloaded successfully
    CandidateDownloaded {
        /// Media path of the item
        item: PathBuf,
        /// Provider the candidate came from
        provider: String,
        /// Opaque candidate id
        candidate_id: String,
    },

    /// A transcription job was accepted into the queue
    TranscriptionQueued {
        /// Job id
        job_id: Uuid,
    },

    /// A running transcription job advanced
    TranscriptionProgress {
        /// Job id
        job_id: Uuid,
        /// Completed fraction, 0.0 to 1.0
        progress: f32,
    },

    /// A transcription job finished successfully
    TranscriptionCompleted {
        /// Job id
        job_id: Uuid,
    },

    /// A transcription job failed or was cancelled
    TranscriptionFailed {
        /// Job id
        job_id: Uuid,
        /// Failure detail
        error: String,
    },

    /// An item ended up with a subtitle
    ItemResolved {
        /// Media path of the item
        item: PathBuf,
        /// Where the subtitle came from
        source: SubtitleSource,
    },
}

/// Publisher half of the event channel. Cheap to clone; every publish is
/// fire-and-forget.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl EventSender {
    /// Create a connected sender/receiver pair.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Create a sender that discards every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Publish an event. Never blocks, never errors.
    pub fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                trace!("Event receiver dropped, discarding event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_withConnectedReceiver_shouldDeliverInOrder() {
        let (sender, mut rx) = EventSender::channel();

        sender.emit(PipelineEvent::TranscriptionQueued { job_id: Uuid::nil() });
        sender.emit(PipelineEvent::TranscriptionCompleted { job_id: Uuid::nil() });

        assert!(matches!(rx.recv().await, Some(PipelineEvent::TranscriptionQueued { .. })));
        assert!(matches!(rx.recv().await, Some(PipelineEvent::TranscriptionCompleted { .. })));
    }

    #[tokio::test]
    async fn test_emit_withDroppedReceiver_shouldNotPanic() {
        let (sender, rx) = EventSender::channel();
        drop(rx);
        sender.emit(PipelineEvent::TranscriptionQueued { job_id: Uuid::nil() });
    }

    #[tokio::test]
    async fn test_emit_withDisabledSender_shouldDiscardSilently() {
        let sender = EventSender::disabled();
        sender.emit(PipelineEvent::TranscriptionQueued { job_id: Uuid::nil() });
    }
}
