/*!
 * Subtitle document handling.
 *
 * A thin model for timed dialogue lines with SRT parse/format support.
 * Translation replaces line text while preserving the original timing;
 * transcription builds a document directly from backend segments.
 */

use std::fmt;
use std::path::PathBuf;

use anyhow::{Result, anyhow};

use crate::transcription::Transcript;

/// A single timed dialogue line.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleLine {
    /// Sequence number (1-based in SRT output)
    pub seq_num: usize,

    /// Start time in milliseconds
    pub start_time_ms: u64,

    /// End time in milliseconds
    pub end_time_ms: u64,

    /// Line text, possibly multi-line
    pub text: String,
}

impl SubtitleLine {
    /// Create a new subtitle line.
    pub fn new(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: String) -> Self {
        Self {
            seq_num,
            start_time_ms,
            end_time_ms,
            text,
        }
    }

    /// Parse an SRT timestamp (HH:MM:SS,mmm) to milliseconds.
    pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
        let parts: Vec<&str> = timestamp.trim().split([':', ',', '.']).collect();
        if parts.len() != 4 {
            return Err(anyhow!("Invalid timestamp format: {}", timestamp));
        }

        let hours: u64 = parts[0].parse()?;
        let minutes: u64 = parts[1].parse()?;
        let seconds: u64 = parts[2].parse()?;
        let millis: u64 = parts[3].parse()?;

        if minutes >= 60 || seconds >= 60 || millis >= 1000 {
            return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
        }

        Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm).
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

impl fmt::Display for SubtitleLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.seq_num)?;
        writeln!(
            f,
            "{} --> {}",
            Self::format_timestamp(self.start_time_ms),
            Self::format_timestamp(self.end_time_ms)
        )?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// An ordered collection of subtitle lines with language metadata.
#[derive(Debug, Clone)]
pub struct SubtitleDocument {
    /// Where the document came from, if it has a file origin
    pub source_file: Option<PathBuf>,

    /// Ordered dialogue lines
    pub lines: Vec<SubtitleLine>,

    /// ISO language code of the line text
    pub language: String,
}

impl SubtitleDocument {
    /// Create a document from already-built lines.
    pub fn from_lines(lines: Vec<SubtitleLine>, language: &str) -> Self {
        Self {
            source_file: None,
            lines,
            language: language.to_string(),
        }
    }

    /// Parse SRT-formatted text into a document.
    pub fn parse_srt(content: &str, language: &str) -> Result<Self> {
        let mut lines = Vec::new();
        let mut seq_num = 0usize;

        // Blocks are separated by blank lines; tolerate \r\n and BOM
        let content = content.trim_start_matches('\u{feff}');
        for block in content.replace("\r\n", "\n").split("\n\n") {
            let block_lines: Vec<&str> =
                block.lines().map(str::trim_end).filter(|l| !l.is_empty()).collect();
            if block_lines.len() < 2 {
                continue;
            }

            // First line is the sequence number, second the timing row.
            // Some files omit the number, so probe both positions.
            let timing_idx = if block_lines[0].contains("-->") { 0 } else { 1 };
            let Some(timing_row) = block_lines.get(timing_idx) else {
                continue;
            };

            let Some((start_raw, end_raw)) = timing_row.split_once("-->") else {
                continue;
            };

            let start_time_ms = SubtitleLine::parse_timestamp(start_raw)?;
            let end_time_ms = SubtitleLine::parse_timestamp(end_raw)?;
            let text = block_lines[timing_idx + 1..].join("\n");
            if text.trim().is_empty() {
                continue;
            }

            seq_num += 1;
            lines.push(SubtitleLine::new(seq_num, start_time_ms, end_time_ms, text));
        }

        if lines.is_empty() {
            return Err(anyhow!("No subtitle lines found in SRT content"));
        }

        Ok(Self::from_lines(lines, language))
    }

    /// Build a document from a transcription result, one line per segment.
    pub fn from_transcript(transcript: &Transcript) -> Self {
        let lines = transcript
            .segments
            .iter()
            .enumerate()
            .map(|(i, seg)| SubtitleLine::new(i + 1, seg.start_ms, seg.end_ms, seg.text.clone()))
            .collect();

        Self::from_lines(lines, &transcript.detected_language)
    }

    /// Render the document back to SRT format.
    pub fn to_srt_string(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.to_string());
        }
        out
    }

    /// Replace line texts with their translations, keeping the timing.
    ///
    /// Fails if the translation count does not match the line count.
    pub fn with_translated_texts(&self, texts: Vec<String>, language: &str) -> Result<Self> {
        if texts.len() != self.lines.len() {
            return Err(anyhow!(
                "Translated line count {} does not match document line count {}",
                texts.len(),
                self.lines.len()
            ));
        }

        let lines = self
            .lines
            .iter()
            .zip(texts)
            .map(|(line, text)| SubtitleLine::new(line.seq_num, line.start_time_ms, line.end_time_ms, text))
            .collect();

        Ok(Self {
            source_file: self.source_file.clone(),
            lines,
            language: language.to_string(),
        })
    }
}
