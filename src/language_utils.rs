/*!
 * Language utilities for ISO language code handling.
 *
 * Subtitle providers, embedded stream tags and transcription backends all
 * report languages in a mix of ISO 639-1 (2-letter) and ISO 639-2 (3-letter,
 * both /T and /B) codes, sometimes with a region suffix ("pt-BR"). The
 * scoring engine and the embedded-match stage compare languages through the
 * helpers here so a "ger" stream still matches a "de" target.
 */

use anyhow::{Result, anyhow};
use isolang::Language;

/// ISO 639-2/B codes that differ from their 639-2/T counterpart.
const PART2B_TO_PART2T: &[(&str, &str)] = &[
    ("fre", "fra"), // French
    ("ger", "deu"), // German
    ("dut", "nld"), // Dutch
    ("gre", "ell"), // Greek
    ("chi", "zho"), // Chinese
    ("cze", "ces"), // Czech
    ("ice", "isl"), // Icelandic
    ("alb", "sqi"), // Albanian
    ("arm", "hye"), // Armenian
    ("baq", "eus"), // Basque
    ("bur", "mya"), // Burmese
    ("per", "fas"), // Persian
    ("geo", "kat"), // Georgian
    ("may", "msa"), // Malay
    ("mac", "mkd"), // Macedonian
    ("rum", "ron"), // Romanian
    ("slo", "slk"), // Slovak
    ("wel", "cym"), // Welsh
];

/// Strip an optional region suffix ("pt-BR" -> "pt", "zh_Hant" -> "zh").
fn strip_region(code: &str) -> &str {
    code.split(['-', '_']).next().unwrap_or(code)
}

/// Normalize a language code to ISO 639-2/T (3-letter) format.
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    let base = strip_region(code.trim()).to_lowercase();

    if base.len() == 2 {
        if let Some(lang) = Language::from_639_1(&base) {
            return Ok(lang.to_639_3().to_string());
        }
    } else if base.len() == 3 {
        if Language::from_639_3(&base).is_some() {
            return Ok(base);
        }
        if let Some((_, part2t)) = PART2B_TO_PART2T.iter().find(|(b, _)| *b == base) {
            return Ok((*part2t).to_string());
        }
    }

    Err(anyhow!("Cannot normalize invalid language code: {}", code))
}

/// Check whether two language codes refer to the same language,
/// regardless of which ISO 639 flavor each of them uses.
pub fn language_codes_match(a: &str, b: &str) -> bool {
    match (normalize_to_part2t(a), normalize_to_part2t(b)) {
        (Ok(na), Ok(nb)) => na == nb,
        // Unrecognized codes only match on exact (case-insensitive) equality
        _ => a.trim().eq_ignore_ascii_case(b.trim()),
    }
}

/// Check whether two codes match exactly, including any region suffix.
///
/// "pt-BR" matches "pt-br" but not plain "pt"; used for the exact-match
/// bonus in scoring, where the region-insensitive match scores lower.
pub fn language_codes_match_exact(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Get the English name of a language for prompt building and logging.
pub fn get_language_name(code: &str) -> Result<String> {
    let part2t = normalize_to_part2t(code)?;
    Language::from_639_3(&part2t)
        .map(|lang| lang.to_name().to_string())
        .ok_or_else(|| anyhow!("Unknown language code: {}", code))
}
