/*!
 * Prompt assembly and response parsing for LLM translation backends.
 *
 * The prompt carries, in order: the glossary block, a clearly delimited
 * "context, do not translate" block for the preceding dialogue, the
 * numbered target lines, and a second context block for the following
 * dialogue. All LLM backends share this layout so their outputs parse the
 * same way.
 */

use crate::errors::TranslationBackendError;
use crate::language_utils;

use super::TranslationBatch;

/// System prompt shared by all LLM backends.
pub fn system_prompt(batch: &TranslationBatch) -> String {
    let source = language_utils::get_language_name(&batch.source_language)
        .unwrap_or_else(|_| batch.source_language.clone());
    let target = language_utils::get_language_name(&batch.target_language)
        .unwrap_or_else(|_| batch.target_language.clone());

    format!(
        "You are a professional subtitle translator. Translate dialogue lines from {} to {}. \
         Preserve line breaks within a line and keep the register of the original. \
         Respond only with the translated lines, numbered exactly like the input, \
         one per input line, without explanations.",
        source, target
    )
}

/// Build the user prompt for a batch.
pub fn build_prompt(batch: &TranslationBatch) -> String {
    let mut prompt = String::new();

    if !batch.glossary.is_empty() {
        prompt.push_str("=== GLOSSARY - use these exact translations ===\n");
        for entry in &batch.glossary {
            match &entry.notes {
                Some(notes) => prompt.push_str(&format!(
                    "{} => {} ({})\n",
                    entry.source_term, entry.target_term, notes
                )),
                None => prompt.push_str(&format!("{} => {}\n", entry.source_term, entry.target_term)),
            }
        }
        prompt.push('\n');
    }

    if !batch.context_before.is_empty() {
        prompt.push_str("=== CONTEXT BEFORE - do not translate ===\n");
        for line in &batch.context_before {
            prompt.push_str(&format!("{}\n", line.text));
        }
        prompt.push('\n');
    }

    prompt.push_str("=== TRANSLATE THESE LINES ===\n");
    for (i, line) in batch.lines.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, line));
    }
    prompt.push('\n');

    if !batch.context_after.is_empty() {
        prompt.push_str("=== CONTEXT AFTER - do not translate ===\n");
        for line in &batch.context_after {
            prompt.push_str(&format!("{}\n", line.text));
        }
    }

    prompt
}

/// Parse a numbered-lines response back into exactly `expected` lines.
pub fn parse_numbered_lines(
    response: &str,
    expected: usize,
) -> Result<Vec<String>, TranslationBackendError> {
    let mut lines: Vec<String> = Vec::with_capacity(expected);

    for raw in response.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }

        // Accept "1. text", "1) text" and "1: text" numbering
        let without_number = trimmed
            .split_once(['.', ')', ':'])
            .filter(|(prefix, _)| prefix.chars().all(|c| c.is_ascii_digit()) && !prefix.is_empty())
            .map(|(_, rest)| rest.trim_start());

        match without_number {
            Some(text) => lines.push(text.to_string()),
            // Unnumbered continuation belongs to the previous line
            None => match lines.last_mut() {
                Some(last) => {
                    last.push('\n');
                    last.push_str(trimmed);
                }
                None => {
                    return Err(TranslationBackendError::ParseError(format!(
                        "Response does not start with a numbered line: {}",
                        trimmed
                    )));
                }
            },
        }
    }

    if lines.len() != expected {
        return Err(TranslationBackendError::LineCountMismatch {
            got: lines.len(),
            expected,
        });
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::{ContextLine, GlossaryEntry, GlossaryScope};

    fn batch() -> TranslationBatch {
        TranslationBatch {
            lines: vec!["Hello world".to_string(), "Goodbye".to_string()],
            context_before: vec![ContextLine {
                start_time_ms: 0,
                end_time_ms: 1000,
                text: "Earlier line".to_string(),
            }],
            context_after: vec![ContextLine {
                start_time_ms: 9000,
                end_time_ms: 10000,
                text: "Later line".to_string(),
            }],
            glossary: vec![GlossaryEntry::new("world", "Welt", GlossaryScope::Global)],
            attempt: 0,
            source_language: "en".to_string(),
            target_language: "de".to_string(),
        }
    }

    #[test]
    fn test_buildPrompt_shouldOrderBlocksAsSpecified() {
        let prompt = build_prompt(&batch());

        let glossary_pos = prompt.find("GLOSSARY").unwrap();
        let before_pos = prompt.find("CONTEXT BEFORE").unwrap();
        let translate_pos = prompt.find("TRANSLATE THESE LINES").unwrap();
        let after_pos = prompt.find("CONTEXT AFTER").unwrap();

        assert!(glossary_pos < before_pos);
        assert!(before_pos < translate_pos);
        assert!(translate_pos < after_pos);
    }

    #[test]
    fn test_buildPrompt_shouldNumberTargetLines() {
        let prompt = build_prompt(&batch());
        assert!(prompt.contains("1. Hello world"));
        assert!(prompt.contains("2. Goodbye"));
    }

    #[test]
    fn test_buildPrompt_withEmptyBlocks_shouldOmitThem() {
        let mut b = batch();
        b.glossary.clear();
        b.context_before.clear();
        b.context_after.clear();

        let prompt = build_prompt(&b);
        assert!(!prompt.contains("GLOSSARY"));
        assert!(!prompt.contains("CONTEXT"));
        assert!(prompt.contains("TRANSLATE THESE LINES"));
    }

    #[test]
    fn test_systemPrompt_shouldNameLanguages() {
        let prompt = system_prompt(&batch());
        assert!(prompt.contains("English"));
        assert!(prompt.contains("German"));
    }

    #[test]
    fn test_parseNumberedLines_withCleanResponse_shouldParseAll() {
        let lines = parse_numbered_lines("1. Hallo Welt\n2. Auf Wiedersehen\n", 2).unwrap();
        assert_eq!(lines, vec!["Hallo Welt", "Auf Wiedersehen"]);
    }

    #[test]
    fn test_parseNumberedLines_withAlternativeNumbering_shouldParse() {
        let lines = parse_numbered_lines("1) Eins\n2: Zwei\n", 2).unwrap();
        assert_eq!(lines, vec!["Eins", "Zwei"]);
    }

    #[test]
    fn test_parseNumberedLines_withContinuation_shouldJoinToPreviousLine() {
        let lines = parse_numbered_lines("1. Erste Zeile\nzweiter Teil\n2. Zweite\n", 2).unwrap();
        assert_eq!(lines[0], "Erste Zeile\nzweiter Teil");
    }

    #[test]
    fn test_parseNumberedLines_withWrongCount_shouldFail() {
        let result = parse_numbered_lines("1. Nur eine\n", 2);
        assert!(matches!(
            result,
            Err(TranslationBackendError::LineCountMismatch { got: 1, expected: 2 })
        ));
    }
}
