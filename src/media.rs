/*!
 * Media inspection collaborator.
 *
 * The pipeline never touches ffmpeg/ffprobe itself; it talks to a
 * `MediaInspector` that can list embedded streams, extract a subtitle
 * stream to a document and extract an audio track to a temporary file
 * suitable for transcription. Extraction mechanics live outside this
 * crate; only the input/output contract is fixed here.
 */

use std::path::Path;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tempfile::NamedTempFile;

use crate::subtitle::SubtitleDocument;

/// Kind of an embedded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Audio track
    Audio,
    /// Embedded subtitle track
    Subtitle,
}

/// A single embedded stream as reported by the media inspector.
#[derive(Debug, Clone)]
pub struct MediaStream {
    /// Stream index within the container
    pub index: u32,

    /// Audio or subtitle
    pub kind: StreamKind,

    /// Codec name (e.g. "subrip", "aac")
    pub codec: String,

    /// Language tag, if the container carries one
    pub language: Option<String>,

    /// Whether the stream is flagged as forced
    pub forced: bool,

    /// Whether the stream is flagged as hearing-impaired/SDH
    pub hearing_impaired: bool,
}

/// Collaborator that inspects media containers and extracts streams.
#[async_trait]
pub trait MediaInspector: Send + Sync {
    /// List embedded subtitle and audio streams with codec/language/flags.
    async fn list_streams(&self, media: &Path) -> Result<Vec<MediaStream>>;

    /// Extract a single embedded subtitle stream as a document.
    async fn extract_subtitle(&self, media: &Path, stream_index: u32) -> Result<SubtitleDocument>;

    /// Extract/transcode the chosen audio track to a format suitable for
    /// transcription. The returned temp file owns the extracted audio and
    /// deletes it on drop, so cleanup happens on every exit path.
    async fn extract_audio(&self, media: &Path, stream_index: u32) -> Result<NamedTempFile>;
}

/// Pick the audio stream to transcribe: first match on the language hint,
/// falling back to the first audio track.
pub fn select_audio_stream<'a>(
    streams: &'a [MediaStream],
    language_hint: Option<&str>,
) -> Result<&'a MediaStream> {
    let audio: Vec<&MediaStream> = streams.iter().filter(|s| s.kind == StreamKind::Audio).collect();

    if audio.is_empty() {
        return Err(anyhow!("Media has no audio streams"));
    }

    if let Some(hint) = language_hint {
        if let Some(stream) = audio.iter().find(|s| {
            s.language
                .as_deref()
                .is_some_and(|lang| crate::language_utils::language_codes_match(lang, hint))
        }) {
            return Ok(stream);
        }
    }

    Ok(audio[0])
}

/// Scripted media inspector for tests. Streams and embedded subtitle
/// documents are registered up front; extracted audio is a real temp file
/// so deletion can be asserted.
pub struct MockInspector {
    streams: parking_lot::Mutex<Vec<MediaStream>>,
    subtitles: parking_lot::Mutex<std::collections::HashMap<u32, SubtitleDocument>>,
    last_audio_path: parking_lot::Mutex<Option<std::path::PathBuf>>,
}

impl MockInspector {
    /// Create an inspector reporting the given streams.
    pub fn with_streams(streams: Vec<MediaStream>) -> Self {
        Self {
            streams: parking_lot::Mutex::new(streams),
            subtitles: parking_lot::Mutex::new(std::collections::HashMap::new()),
            last_audio_path: parking_lot::Mutex::new(None),
        }
    }

    /// Create an inspector reporting a single audio track in `language`.
    pub fn with_audio_track(language: &str) -> Self {
        Self::with_streams(vec![MediaStream {
            index: 1,
            kind: StreamKind::Audio,
            codec: "aac".to_string(),
            language: Some(language.to_string()),
            forced: false,
            hearing_impaired: false,
        }])
    }

    /// Register the document returned for an embedded subtitle stream.
    pub fn script_subtitle(&self, stream_index: u32, document: SubtitleDocument) {
        self.subtitles.lock().insert(stream_index, document);
    }

    /// Path of the most recently extracted audio temp file.
    pub fn last_audio_path(&self) -> Option<std::path::PathBuf> {
        self.last_audio_path.lock().clone()
    }
}

#[async_trait]
impl MediaInspector for MockInspector {
    async fn list_streams(&self, _media: &Path) -> Result<Vec<MediaStream>> {
        Ok(self.streams.lock().clone())
    }

    async fn extract_subtitle(&self, _media: &Path, stream_index: u32) -> Result<SubtitleDocument> {
        self.subtitles
            .lock()
            .get(&stream_index)
            .cloned()
            .ok_or_else(|| anyhow!("No subtitle scripted for stream {}", stream_index))
    }

    async fn extract_audio(&self, _media: &Path, _stream_index: u32) -> Result<NamedTempFile> {
        let file = NamedTempFile::new()?;
        std::fs::write(file.path(), b"RIFF")?;
        *self.last_audio_path.lock() = Some(file.path().to_path_buf());
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(index: u32, language: Option<&str>) -> MediaStream {
        MediaStream {
            index,
            kind: StreamKind::Audio,
            codec: "aac".to_string(),
            language: language.map(str::to_string),
            forced: false,
            hearing_impaired: false,
        }
    }

    #[test]
    fn test_selectAudioStream_withMatchingHint_shouldPickTaggedTrack() {
        let streams = vec![audio(1, Some("eng")), audio(2, Some("jpn"))];
        let picked = select_audio_stream(&streams, Some("ja")).unwrap();
        assert_eq!(picked.index, 2);
    }

    #[test]
    fn test_selectAudioStream_withoutMatch_shouldFallBackToFirstAudio() {
        let streams = vec![audio(1, Some("eng")), audio(2, Some("jpn"))];
        let picked = select_audio_stream(&streams, Some("fr")).unwrap();
        assert_eq!(picked.index, 1);
    }

    #[test]
    fn test_selectAudioStream_withNoAudio_shouldFail() {
        let streams = vec![MediaStream {
            index: 0,
            kind: StreamKind::Subtitle,
            codec: "subrip".to_string(),
            language: Some("eng".to_string()),
            forced: false,
            hearing_impaired: false,
        }];
        assert!(select_audio_stream(&streams, None).is_err());
    }
}
