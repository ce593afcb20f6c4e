/*!
 * Subtitle acquisition pipeline.
 *
 * For each library item the pipeline attempts, in order: a direct embedded
 * subtitle match, an embedded subtitle translated to the target language, a
 * provider download (optionally translated), and finally speech-to-text.
 * Each stage is terminal on success. Stage failures are recorded in a
 * diagnostic trail and never abort the run; only the transcription fallback
 * failing too makes the item terminally failed.
 *
 * Transcription never blocks the caller: stage D returns `Pending` with a
 * job id and the outcome is resolved later, after the queue publishes the
 * job's completion event.
 */

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::app_config::Config;
use crate::errors::ConfigurationError;
use crate::health::HealthTracker;
use crate::language_utils;
use crate::media::{MediaInspector, MediaStream, StreamKind};
use crate::providers::search::gather_candidates;
use crate::providers::{ProviderRegistry, SubtitleQuery};
use crate::scoring::{ReputationCache, ScoringEngine};
use crate::subtitle::SubtitleDocument;
use crate::transcription::{
    JobStatus, TranscriptionBackend, TranscriptionQueue, WhisperHttp,
};
use crate::translation::{GlossaryEntry, TranslationManager};

pub mod events;

pub use events::{EventSender, PipelineEvent};

/// A library item that needs a subtitle.
#[derive(Debug, Clone)]
pub struct LibraryItem {
    /// Path to the media file
    pub media_path: PathBuf,

    /// Title of the movie or series
    pub title: String,

    /// Release year, if known
    pub year: Option<i32>,

    /// Season number for series episodes
    pub season: Option<u32>,

    /// Episode number for series episodes
    pub episode: Option<u32>,

    /// Series key, used to pick the per-series glossary
    pub series: Option<String>,

    /// Release group of the local file, if known
    pub release_group: Option<String>,
}

impl LibraryItem {
    /// Create an item with just a path and title.
    pub fn new(media_path: impl Into<PathBuf>, title: &str) -> Self {
        Self {
            media_path: media_path.into(),
            title: title.to_string(),
            year: None,
            season: None,
            episode: None,
            series: None,
            release_group: None,
        }
    }
}

/// Pipeline stages, in attempt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// A: embedded subtitle already in the target language
    EmbeddedMatch,
    /// B: embedded subtitle in another language, translated
    EmbeddedTranslate,
    /// C: provider search and download
    ProviderDownload,
    /// D: speech-to-text fallback
    Transcription,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::EmbeddedMatch => "embedded-match",
            Self::EmbeddedTranslate => "embedded-translate",
            Self::ProviderDownload => "provider-download",
            Self::Transcription => "transcription",
        };
        write!(f, "{}", name)
    }
}

/// One entry in the diagnostic trail.
#[derive(Debug, Clone)]
pub struct StageFailure {
    /// Stage that failed
    pub stage: Stage,

    /// Failure detail
    pub error: String,
}

/// Where a resolved subtitle came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtitleSource {
    /// Embedded track already in the target language
    Embedded,
    /// Embedded track translated to the target language
    EmbeddedTranslated,
    /// Downloaded from the named provider
    Provider(String),
    /// Produced by the speech-to-text fallback
    Transcription,
}

/// Terminal (or deferred) outcome of an acquisition run.
#[derive(Debug)]
pub enum AcquisitionOutcome {
    /// A subtitle in the target language was produced
    Done {
        /// Where it came from
        source: SubtitleSource,
        /// The subtitle document
        subtitle: SubtitleDocument,
    },

    /// Stage D was entered; resolution arrives through the event channel
    Pending {
        /// Transcription job id
        job_id: Uuid,
    },

    /// Every stage failed; one trail entry per attempted stage
    Failed {
        /// Diagnostic trail, in stage order
        trail: Vec<StageFailure>,
    },
}

/// State carried between `acquire` returning `Pending` and the later
/// `resolve_transcription` call.
struct PendingJob {
    item: LibraryItem,
    trail: Vec<StageFailure>,
}

/// Orchestrates the four acquisition stages for library items.
pub struct AcquisitionPipeline {
    config: Config,
    inspector: Arc<dyn MediaInspector>,
    registry: ProviderRegistry,
    health: Arc<HealthTracker>,
    reputation: ReputationCache,
    scoring: ScoringEngine,
    translator: TranslationManager,
    queue: TranscriptionQueue,
    events: EventSender,
    global_glossary: Vec<GlossaryEntry>,
    series_glossaries: HashMap<String, Vec<GlossaryEntry>>,
    pending: Mutex<HashMap<Uuid, PendingJob>>,
}

impl AcquisitionPipeline {
    /// Assemble a pipeline from pre-built collaborators.
    pub fn new(
        config: Config,
        inspector: Arc<dyn MediaInspector>,
        registry: ProviderRegistry,
        translator: TranslationManager,
        transcriber: Arc<dyn TranscriptionBackend>,
        events: EventSender,
    ) -> Self {
        let health = Arc::new(HealthTracker::new(config.health.clone()));
        let reputation =
            ReputationCache::new(Duration::from_secs(config.scoring.reputation_ttl_secs));
        let scoring = ScoringEngine::new(config.scoring.clone());
        let queue = TranscriptionQueue::new(
            transcriber,
            inspector.clone(),
            &config.transcription,
            events.clone(),
        );

        Self {
            config,
            inspector,
            registry,
            health,
            reputation,
            scoring,
            translator,
            queue,
            events,
            global_glossary: Vec::new(),
            series_glossaries: HashMap::new(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Build every collaborator from configuration. The media inspector
    /// stays injected; it is an external integration.
    pub fn from_config(
        config: Config,
        inspector: Arc<dyn MediaInspector>,
        events: EventSender,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let registry = ProviderRegistry::from_config(&config.providers)?;
        let translator = TranslationManager::from_config(&config)?;
        let transcriber: Arc<dyn TranscriptionBackend> =
            Arc::new(WhisperHttp::from_config(&config.transcription));
        Ok(Self::new(config, inspector, registry, translator, transcriber, events))
    }

    /// Replace the glossaries used for translation, typically loaded from
    /// the repository at startup.
    pub fn set_glossaries(
        &mut self,
        global: Vec<GlossaryEntry>,
        series: HashMap<String, Vec<GlossaryEntry>>,
    ) {
        self.global_glossary = global;
        self.series_glossaries = series;
    }

    /// Health tracker, exposed for persistence loads/saves.
    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    /// Transcription queue, exposed for job inspection and cancellation.
    pub fn transcriptions(&self) -> &TranscriptionQueue {
        &self.queue
    }

    /// Run stages A through C for an item, entering stage D when they all
    /// fail. Never blocks on transcription: stage D yields `Pending`.
    pub async fn acquire(&self, item: &LibraryItem) -> AcquisitionOutcome {
        let mut trail: Vec<StageFailure> = Vec::new();

        // Stage A: embedded subtitle already in the target language
        if let Some(subtitle) = self
            .run_stage(item, Stage::EmbeddedMatch, &mut trail, self.try_embedded_match(item))
            .await
        {
            return self.resolved(item, SubtitleSource::Embedded, subtitle);
        }

        // Stage B: embedded subtitle in a source language, translated
        if let Some(subtitle) = self
            .run_stage(item, Stage::EmbeddedTranslate, &mut trail, self.try_embedded_translate(item))
            .await
        {
            return self.resolved(item, SubtitleSource::EmbeddedTranslated, subtitle);
        }

        // Stage C: provider search, rank, bounded download attempts
        self.events.emit(PipelineEvent::StageStarted {
            item: item.media_path.clone(),
            stage: Stage::ProviderDownload,
        });
        match self.try_provider_download(item).await {
            Ok((provider, subtitle)) => {
                return self.resolved(item, SubtitleSource::Provider(provider), subtitle);
            }
            Err(e) => {
                warn!("Stage {} failed for {}: {:#}", Stage::ProviderDownload, item.media_path.display(), e);
                self.events.emit(PipelineEvent::StageFailed {
                    item: item.media_path.clone(),
                    stage: Stage::ProviderDownload,
                    error: format!("{:#}", e),
                });
                trail.push(StageFailure {
                    stage: Stage::ProviderDownload,
                    error: format!("{:#}", e),
                });
            }
        }

        // Stage D: speech-to-text, deferred
        self.events.emit(PipelineEvent::StageStarted {
            item: item.media_path.clone(),
            stage: Stage::Transcription,
        });
        let language_hint = self.config.preferred_source_languages.first().cloned();
        let job_id = self.queue.enqueue(item.media_path.clone(), language_hint);
        self.pending.lock().insert(
            job_id,
            PendingJob {
                item: item.clone(),
                trail,
            },
        );

        AcquisitionOutcome::Pending { job_id }
    }

    /// Resolve a `Pending` outcome once its transcription job is terminal.
    ///
    /// Returns `None` while the job is still queued or running, or when the
    /// job id is unknown. A successful transcript is fed through the
    /// translation manager exactly like a synchronous stage.
    pub async fn resolve_transcription(&self, job_id: Uuid) -> Option<AcquisitionOutcome> {
        let job = self.queue.get_job(job_id)?;
        if !job.is_terminal() {
            return None;
        }

        let PendingJob { item, mut trail } = self.pending.lock().remove(&job_id)?;

        if job.status == JobStatus::Failed {
            let error = job.error.unwrap_or_else(|| "Transcription failed".to_string());
            self.events.emit(PipelineEvent::StageFailed {
                item: item.media_path.clone(),
                stage: Stage::Transcription,
                error: error.clone(),
            });
            trail.push(StageFailure {
                stage: Stage::Transcription,
                error,
            });
            return Some(AcquisitionOutcome::Failed { trail });
        }

        // Done: the transcript becomes a document in the detected language.
        let transcript = job.transcript?;
        let document = SubtitleDocument::from_transcript(&transcript);
        let target = self.config.target_language.clone();

        if language_utils::language_codes_match(&document.language, &target) {
            return Some(self.resolved(&item, SubtitleSource::Transcription, document));
        }

        let (global, series) = self.glossaries_for(&item);
        match self.translator.translate_document(&document, &target, global, series).await {
            Ok(translated) => Some(self.resolved(&item, SubtitleSource::Transcription, translated)),
            Err(e) => {
                self.events.emit(PipelineEvent::StageFailed {
                    item: item.media_path.clone(),
                    stage: Stage::Transcription,
                    error: format!("{:#}", e),
                });
                trail.push(StageFailure {
                    stage: Stage::Transcription,
                    error: format!("{:#}", e),
                });
                Some(AcquisitionOutcome::Failed { trail })
            }
        }
    }

    /// Run one fallible stage, recording the failure in the trail.
    async fn run_stage(
        &self,
        item: &LibraryItem,
        stage: Stage,
        trail: &mut Vec<StageFailure>,
        attempt: impl std::future::Future<Output = Result<SubtitleDocument>>,
    ) -> Option<SubtitleDocument> {
        self.events.emit(PipelineEvent::StageStarted {
            item: item.media_path.clone(),
            stage,
        });

        match attempt.await {
            Ok(subtitle) => Some(subtitle),
            Err(e) => {
                warn!("Stage {} failed for {}: {:#}", stage, item.media_path.display(), e);
                self.events.emit(PipelineEvent::StageFailed {
                    item: item.media_path.clone(),
                    stage,
                    error: format!("{:#}", e),
                });
                trail.push(StageFailure {
                    stage,
                    error: format!("{:#}", e),
                });
                None
            }
        }
    }

    fn resolved(
        &self,
        item: &LibraryItem,
        source: SubtitleSource,
        subtitle: SubtitleDocument,
    ) -> AcquisitionOutcome {
        info!(
            "Resolved subtitle for {} via {:?}",
            item.media_path.display(),
            source
        );
        self.events.emit(PipelineEvent::ItemResolved {
            item: item.media_path.clone(),
            source: source.clone(),
        });
        AcquisitionOutcome::Done { source, subtitle }
    }

    fn glossaries_for(&self, item: &LibraryItem) -> (&[GlossaryEntry], &[GlossaryEntry]) {
        let series = item
            .series
            .as_deref()
            .and_then(|key| self.series_glossaries.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        (&self.global_glossary, series)
    }

    /// Stage A: an embedded subtitle track already in the target language.
    async fn try_embedded_match(&self, item: &LibraryItem) -> Result<SubtitleDocument> {
        let streams = self
            .inspector
            .list_streams(&item.media_path)
            .await
            .context("Failed to list embedded streams")?;

        let stream = streams
            .iter()
            .filter(|s| s.kind == StreamKind::Subtitle)
            .find(|s| self.matches_target(s))
            .ok_or_else(|| {
                anyhow!(
                    "No embedded subtitle in target language {}",
                    self.config.target_language
                )
            })?;

        self.inspector
            .extract_subtitle(&item.media_path, stream.index)
            .await
            .context("Failed to extract embedded subtitle")
    }

    /// Stage B: extract an embedded source-language track and translate it.
    async fn try_embedded_translate(&self, item: &LibraryItem) -> Result<SubtitleDocument> {
        let streams = self
            .inspector
            .list_streams(&item.media_path)
            .await
            .context("Failed to list embedded streams")?;

        let stream = self
            .select_source_subtitle(&streams)
            .ok_or_else(|| anyhow!("No embedded subtitle usable as translation source"))?;

        let document = self
            .inspector
            .extract_subtitle(&item.media_path, stream.index)
            .await
            .context("Failed to extract embedded subtitle")?;

        let (global, series) = self.glossaries_for(item);
        self.translator
            .translate_document(&document, &self.config.target_language, global, series)
            .await
    }

    /// Stage C: gather, rank, then download candidates best-first with a
    /// bounded attempt count.
    async fn try_provider_download(
        &self,
        item: &LibraryItem,
    ) -> Result<(String, SubtitleDocument)> {
        let providers = self.registry.all();
        if providers.is_empty() {
            return Err(anyhow!("No subtitle providers configured"));
        }

        // New reputation epoch only when the snapshot expired; scoring stays
        // deterministic within the epoch.
        self.reputation.refresh_if_stale(&self.health.get_all_stats());

        let query = SubtitleQuery {
            title: item.title.clone(),
            year: item.year,
            season: item.season,
            episode: item.episode,
            language: self.config.target_language.clone(),
            release_group: item.release_group.clone(),
        };

        let gather = gather_candidates(
            &providers,
            &query,
            Duration::from_secs(self.config.pipeline.search_timeout_secs),
            &self.health,
        )
        .await;

        if gather.candidates.is_empty() {
            return Err(anyhow!(
                "No candidates found ({} provider failures, {} disabled)",
                gather.failures.len(),
                gather.skipped_disabled.len()
            ));
        }

        let ranked = self.scoring.rank(
            gather.candidates,
            &query,
            &self.reputation,
            &self.registry.priorities(),
        );

        let attempts = self.config.pipeline.max_download_attempts as usize;
        let mut last_error = anyhow!("No download attempted");

        for scored in ranked.iter().take(attempts) {
            let candidate = &scored.candidate;
            let Some(provider) = self.registry.get(&candidate.provider) else {
                continue;
            };

            match provider.download(&candidate.id).await {
                Ok(bytes) => {
                    self.health.record_outcome(&candidate.provider, true);
                    self.events.emit(PipelineEvent::CandidateDownloaded {
                        item: item.media_path.clone(),
                        provider: candidate.provider.clone(),
                        candidate_id: candidate.id.clone(),
                    });

                    let text = String::from_utf8_lossy(&bytes);
                    match SubtitleDocument::parse_srt(&text, &candidate.language) {
                        Ok(document) => {
                            let document = self.into_target_language(item, document).await?;
                            return Ok((candidate.provider.clone(), document));
                        }
                        Err(e) => {
                            warn!(
                                "Downloaded candidate {}/{} is not parseable: {:#}",
                                candidate.provider, candidate.id, e
                            );
                            last_error = e;
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "Download failed for {}/{}: {}",
                        candidate.provider, candidate.id, e
                    );
                    self.health.record_outcome(&candidate.provider, false);
                    last_error = e.into();
                }
            }
        }

        Err(last_error.context(format!(
            "All {} download attempts failed",
            attempts.min(ranked.len())
        )))
    }

    /// Translate a downloaded document when it is not already in the target
    /// language.
    async fn into_target_language(
        &self,
        item: &LibraryItem,
        document: SubtitleDocument,
    ) -> Result<SubtitleDocument> {
        if language_utils::language_codes_match(&document.language, &self.config.target_language) {
            return Ok(document);
        }

        let (global, series) = self.glossaries_for(item);
        self.translator
            .translate_document(&document, &self.config.target_language, global, series)
            .await
    }

    fn matches_target(&self, stream: &MediaStream) -> bool {
        stream
            .language
            .as_deref()
            .is_some_and(|lang| {
                language_utils::language_codes_match(lang, &self.config.target_language)
            })
    }

    /// Pick the stage B source track: preferred source languages in their
    /// configured order, else the first non-target subtitle stream.
    fn select_source_subtitle<'a>(&self, streams: &'a [MediaStream]) -> Option<&'a MediaStream> {
        let subtitles: Vec<&MediaStream> = streams
            .iter()
            .filter(|s| s.kind == StreamKind::Subtitle)
            .collect();

        for preferred in &self.config.preferred_source_languages {
            if let Some(stream) = subtitles.iter().find(|s| {
                s.language
                    .as_deref()
                    .is_some_and(|lang| language_utils::language_codes_match(lang, preferred))
            }) {
                return Some(stream);
            }
        }

        subtitles.into_iter().find(|s| !self.matches_target(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockInspector;
    use crate::subtitle::SubtitleLine;
    use crate::transcription::MockTranscriber;
    use crate::translation::backends::mock::MockBackend;

    fn config() -> Config {
        Config {
            target_language: "de".to_string(),
            preferred_source_languages: vec!["ja".to_string(), "en".to_string()],
            ..Default::default()
        }
    }

    fn subtitle_stream(index: u32, language: &str) -> MediaStream {
        MediaStream {
            index,
            kind: StreamKind::Subtitle,
            codec: "subrip".to_string(),
            language: Some(language.to_string()),
            forced: false,
            hearing_impaired: false,
        }
    }

    fn audio_stream(index: u32, language: &str) -> MediaStream {
        MediaStream {
            index,
            kind: StreamKind::Audio,
            codec: "aac".to_string(),
            language: Some(language.to_string()),
            forced: false,
            hearing_impaired: false,
        }
    }

    fn document(language: &str, texts: &[&str]) -> SubtitleDocument {
        let lines = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let start = i as u64 * 2500;
                SubtitleLine::new(i + 1, start, start + 2000, text.to_string())
            })
            .collect();
        SubtitleDocument::from_lines(lines, language)
    }

    fn pipeline(inspector: Arc<MockInspector>, backend: Arc<MockBackend>) -> AcquisitionPipeline {
        let cfg = config();
        let translator = TranslationManager::with_chain(vec![backend], &cfg);
        AcquisitionPipeline::new(
            cfg,
            inspector,
            ProviderRegistry::new(),
            translator,
            Arc::new(MockTranscriber::speaking("Hello world", "en")),
            EventSender::disabled(),
        )
    }

    #[tokio::test]
    async fn test_acquire_withEmbeddedTargetMatch_shouldResolveAtStageA() {
        let inspector = Arc::new(MockInspector::with_streams(vec![
            subtitle_stream(2, "ger"),
            audio_stream(1, "jpn"),
        ]));
        inspector.script_subtitle(2, document("de", &["Hallo"]));

        let pipeline = pipeline(inspector, Arc::new(MockBackend::new()));
        let item = LibraryItem::new("/media/film.mkv", "Film");

        match pipeline.acquire(&item).await {
            AcquisitionOutcome::Done { source, subtitle } => {
                assert_eq!(source, SubtitleSource::Embedded);
                assert_eq!(subtitle.lines[0].text, "Hallo");
            }
            other => panic!("Expected Done at stage A, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_acquire_withOnlySourceLanguageTrack_shouldTranslateAtStageB() {
        let inspector = Arc::new(MockInspector::with_streams(vec![
            subtitle_stream(2, "jpn"),
            audio_stream(1, "jpn"),
        ]));
        inspector.script_subtitle(2, document("ja", &["Konnichiwa"]));

        let backend = Arc::new(MockBackend::new());
        backend.script("Konnichiwa", "Guten Tag");
        let pipeline = pipeline(inspector, backend);
        let item = LibraryItem::new("/media/film.mkv", "Film");

        match pipeline.acquire(&item).await {
            AcquisitionOutcome::Done { source, subtitle } => {
                assert_eq!(source, SubtitleSource::EmbeddedTranslated);
                assert_eq!(subtitle.lines[0].text, "Guten Tag");
                assert_eq!(subtitle.language, "de");
            }
            other => panic!("Expected Done at stage B, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_acquire_withNothingEmbeddedAndNoProviders_shouldGoPending() {
        let inspector = Arc::new(MockInspector::with_audio_track("eng"));
        let pipeline = pipeline(inspector, Arc::new(MockBackend::new()));
        let item = LibraryItem::new("/media/film.mkv", "Film");

        match pipeline.acquire(&item).await {
            AcquisitionOutcome::Pending { job_id } => {
                assert!(pipeline.transcriptions().get_job(job_id).is_some());
            }
            other => panic!("Expected Pending, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolveTranscription_beforeJobTerminal_shouldReturnNone() {
        let inspector = Arc::new(MockInspector::with_audio_track("eng"));
        let backend = Arc::new(MockBackend::new());
        let cfg = config();
        let translator = TranslationManager::with_chain(vec![backend], &cfg);

        let transcriber = Arc::new(MockTranscriber::speaking("Hello", "en"));
        transcriber.respond_after(Duration::from_secs(10));
        let pipeline = AcquisitionPipeline::new(
            cfg,
            inspector,
            ProviderRegistry::new(),
            translator,
            transcriber,
            EventSender::disabled(),
        );

        let item = LibraryItem::new("/media/film.mkv", "Film");
        let AcquisitionOutcome::Pending { job_id } = pipeline.acquire(&item).await else {
            panic!("Expected Pending");
        };

        assert!(pipeline.resolve_transcription(job_id).await.is_none());
    }

    #[test]
    fn test_selectSourceSubtitle_shouldHonorPreferredOrderThenFallBack() {
        let inspector = Arc::new(MockInspector::with_audio_track("eng"));
        let pipeline = pipeline(inspector, Arc::new(MockBackend::new()));

        // "en" is preferred over the unlisted "fr", even listed later
        let streams = vec![subtitle_stream(1, "fre"), subtitle_stream(2, "eng")];
        assert_eq!(pipeline.select_source_subtitle(&streams).unwrap().index, 2);

        // No preferred language present: first non-target stream
        let streams = vec![subtitle_stream(1, "ger"), subtitle_stream(2, "fre")];
        assert_eq!(pipeline.select_source_subtitle(&streams).unwrap().index, 2);

        // Only target-language subtitles: nothing to translate from
        let streams = vec![subtitle_stream(1, "ger")];
        assert!(pipeline.select_source_subtitle(&streams).is_none());
    }
}
