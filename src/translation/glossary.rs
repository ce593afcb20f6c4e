/*!
 * Glossary resolution for terminology consistency.
 *
 * Global and per-series terminology overrides are merged into a single
 * ordered term list handed to the prompt builder. Per-series entries are
 * keyed case-insensitively against global entries and take precedence on
 * overlap; the merged list is capped and deterministically ordered so
 * pathological glossaries never bloat prompts.
 */

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope of a glossary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlossaryScope {
    /// Applies to every item in the library
    Global,
    /// Applies to one series, overriding global entries on overlap
    Series,
}

impl std::fmt::Display for GlossaryScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Series => write!(f, "series"),
        }
    }
}

impl std::str::FromStr for GlossaryScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(Self::Global),
            "series" => Ok(Self::Series),
            other => Err(anyhow::anyhow!("Invalid glossary scope: {}", other)),
        }
    }
}

/// A fixed source-term to target-term override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    /// Term as it appears in the source text
    pub source_term: String,

    /// Required translation
    pub target_term: String,

    /// Free-form notes for the translator prompt
    pub notes: Option<String>,

    /// Scope of the entry
    pub scope: GlossaryScope,

    /// Last modification time, used for cap selection
    pub updated_at: DateTime<Utc>,
}

impl GlossaryEntry {
    /// Create an entry updated now.
    pub fn new(source_term: &str, target_term: &str, scope: GlossaryScope) -> Self {
        Self {
            source_term: source_term.to_string(),
            target_term: target_term.to_string(),
            notes: None,
            scope,
            updated_at: Utc::now(),
        }
    }

    /// Case-insensitive merge key.
    fn key(&self) -> String {
        self.source_term.to_lowercase()
    }
}

/// Merges global and per-series glossaries into one capped, ordered list.
pub struct GlossaryResolver {
    max_entries: usize,
}

impl GlossaryResolver {
    /// Create a resolver with the given entry cap.
    pub fn new(max_entries: usize) -> Self {
        Self { max_entries }
    }

    /// Merge global and series entries.
    ///
    /// Each scope is first reduced to its most-recently-updated entries
    /// (at most the cap), series entries overlay global ones on overlapping
    /// keys, and the final list is ordered by lower-cased source term so the
    /// output is deterministic regardless of input order.
    pub fn merge(
        &self,
        global: &[GlossaryEntry],
        series: &[GlossaryEntry],
    ) -> Vec<GlossaryEntry> {
        let mut merged: BTreeMap<String, GlossaryEntry> = BTreeMap::new();

        for entry in Self::most_recent(global, self.max_entries) {
            merged.insert(entry.key(), entry);
        }
        // Series entries win on overlap
        for entry in Self::most_recent(series, self.max_entries) {
            merged.insert(entry.key(), entry);
        }

        let mut entries: Vec<GlossaryEntry> = merged.into_values().collect();

        if entries.len() > self.max_entries {
            // Over the cap even after the per-scope reduction: keep the most
            // recent, then restore key order for deterministic output.
            entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.key().cmp(&b.key())));
            entries.truncate(self.max_entries);
            entries.sort_by_key(|e| e.key());
        }

        entries
    }

    fn most_recent(entries: &[GlossaryEntry], cap: usize) -> Vec<GlossaryEntry> {
        let mut sorted: Vec<GlossaryEntry> = entries.to_vec();
        sorted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.key().cmp(&b.key())));
        sorted.truncate(cap);
        sorted
    }
}
