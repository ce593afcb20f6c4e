/*!
 * Surrounding-dialogue context assembly.
 *
 * For each batch the assembler walks backward and forward from the batch
 * boundaries, collecting up to N lines in each direction. The walk stops at
 * the file boundary or at the first time gap exceeding the scene-break
 * threshold, so context never leaks across a scene change.
 */

use std::ops::Range;

use crate::app_config::ContextConfig;
use crate::subtitle::SubtitleLine;

/// Files with fewer total lines than this ignore N and use every
/// available line as context.
const SHORT_FILE_LINES: usize = 3;

/// A context line with its own timing and text. Context lines are never
/// the lines being translated.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextLine {
    /// Start time in milliseconds
    pub start_time_ms: u64,

    /// End time in milliseconds
    pub end_time_ms: u64,

    /// Line text
    pub text: String,
}

impl ContextLine {
    fn from_subtitle(line: &SubtitleLine) -> Self {
        Self {
            start_time_ms: line.start_time_ms,
            end_time_ms: line.end_time_ms,
            text: line.text.clone(),
        }
    }
}

/// Context window for one batch, both lists in chronological order.
#[derive(Debug, Clone, Default)]
pub struct BatchContext {
    /// Lines immediately before the batch
    pub before: Vec<ContextLine>,

    /// Lines immediately after the batch
    pub after: Vec<ContextLine>,
}

/// Assembles context windows for translation batches.
pub struct ContextAssembler {
    config: ContextConfig,
}

impl ContextAssembler {
    /// Create an assembler with the given window configuration.
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Compute the context window for `batch` within `lines`.
    ///
    /// With a window size of 0 or an empty batch range this returns empty
    /// lists immediately, without touching the line list at all.
    pub fn assemble(&self, lines: &[SubtitleLine], batch: Range<usize>) -> BatchContext {
        let n = self.config.window_size;
        if n == 0 || batch.is_empty() {
            return BatchContext::default();
        }

        // Short files use everything that is not in the batch itself.
        if lines.len() < SHORT_FILE_LINES {
            return BatchContext {
                before: lines[..batch.start.min(lines.len())]
                    .iter()
                    .map(ContextLine::from_subtitle)
                    .collect(),
                after: lines[batch.end.min(lines.len())..]
                    .iter()
                    .map(ContextLine::from_subtitle)
                    .collect(),
            };
        }

        BatchContext {
            before: self.walk_backward(lines, batch.start, n),
            after: self.walk_forward(lines, batch.end, n),
        }
    }

    /// Walk backward from the batch start, newest-to-oldest, then restore
    /// chronological order.
    fn walk_backward(&self, lines: &[SubtitleLine], start: usize, n: usize) -> Vec<ContextLine> {
        let mut collected = Vec::new();
        let mut idx = start;

        while idx > 0 && collected.len() < n {
            let candidate = &lines[idx - 1];
            let next = &lines[idx];

            let gap = next.start_time_ms.saturating_sub(candidate.end_time_ms);
            if gap > self.config.scene_break_ms {
                break;
            }

            collected.push(ContextLine::from_subtitle(candidate));
            idx -= 1;
        }

        collected.reverse();
        collected
    }

    /// Walk forward from the batch end.
    fn walk_forward(&self, lines: &[SubtitleLine], end: usize, n: usize) -> Vec<ContextLine> {
        let mut collected = Vec::new();
        let mut idx = end;

        while idx < lines.len() && collected.len() < n {
            let candidate = &lines[idx];
            let previous = &lines[idx - 1];

            let gap = candidate.start_time_ms.saturating_sub(previous.end_time_ms);
            if gap > self.config.scene_break_ms {
                break;
            }

            collected.push(ContextLine::from_subtitle(candidate));
            idx += 1;
        }

        collected
    }
}
