/*!
 * Deterministic candidate scoring.
 *
 * `compute_score` is side-effect free: base score from language/format/
 * release heuristics, then additive modifiers (provider reputation from the
 * TTL cache, uploader-trust bonus, machine-translation penalty). A penalty
 * of 0 disables the machine-translation feature as a no-op rather than as a
 * special case in the formula.
 */

use std::collections::HashMap;

use log::debug;

use crate::app_config::ScoringConfig;
use crate::language_utils;
use crate::providers::{SubtitleCandidate, SubtitleQuery};

use super::ReputationCache;

/// A candidate together with its computed score.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    /// The scored candidate
    pub candidate: SubtitleCandidate,

    /// Computed score; higher is better
    pub score: i32,
}

/// Scoring engine ranking provider search results.
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    /// Create an engine with the given weights.
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Compute the score for one candidate against a query.
    ///
    /// Pure within a reputation-cache epoch: identical inputs always yield
    /// identical scores while the cache snapshot is unchanged.
    pub fn compute_score(
        &self,
        candidate: &SubtitleCandidate,
        query: &SubtitleQuery,
        reputation: &ReputationCache,
    ) -> i32 {
        let mut score = 0i32;

        // Language match: exact (region included) beats base-language match
        if language_utils::language_codes_match_exact(&candidate.language, &query.language) {
            score += self.config.language_exact_score;
        } else if language_utils::language_codes_match(&candidate.language, &query.language) {
            score += self.config.language_base_score;
        }

        // Format preference
        if candidate.format.eq_ignore_ascii_case(&self.config.preferred_format) {
            score += self.config.format_match_score;
        }

        // Release-group match against the candidate's release name
        if let Some(group) = query.release_group.as_deref() {
            if !group.is_empty()
                && candidate
                    .release_name
                    .to_lowercase()
                    .contains(&group.to_lowercase())
            {
                score += self.config.release_match_score;
            }
        }

        // Provider reputation modifier from the TTL-cached aggregate
        score += reputation.modifier_for(&candidate.provider);

        // Uploader trust bonus
        if candidate.uploader_trusted {
            score += self.config.uploader_trust_bonus;
        }

        // Machine-translation penalty: applies only when the penalty is
        // non-zero AND the candidate is flagged or crosses the confidence
        // threshold. Penalty = 0 leaves the score untouched entirely.
        if self.config.mt_penalty != 0
            && (candidate.machine_translated
                || candidate.mt_confidence >= self.config.mt_confidence_threshold)
        {
            score -= self.config.mt_penalty;
        }

        score
    }

    /// Score and order candidates best-first.
    ///
    /// Ties are broken by configured provider priority (lower wins); equal
    /// score and equal priority keep their first-appearance order from the
    /// gathered result list.
    pub fn rank(
        &self,
        candidates: Vec<SubtitleCandidate>,
        query: &SubtitleQuery,
        reputation: &ReputationCache,
        priorities: &HashMap<String, u32>,
    ) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|candidate| {
                let score = self.compute_score(&candidate, query, reputation);
                debug!(
                    "Scored candidate {}/{} ({}): {}",
                    candidate.provider, candidate.id, candidate.language, score
                );
                ScoredCandidate { candidate, score }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score.cmp(&a.score).then_with(|| {
                let pa = priorities.get(&a.candidate.provider).copied().unwrap_or(u32::MAX);
                let pb = priorities.get(&b.candidate.provider).copied().unwrap_or(u32::MAX);
                pa.cmp(&pb)
            })
        });

        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CandidateFlags;
    use std::time::Duration;

    fn engine() -> ScoringEngine {
        ScoringEngine::new(ScoringConfig::default())
    }

    fn empty_reputation() -> ReputationCache {
        ReputationCache::new(Duration::from_secs(60))
    }

    fn candidate(provider: &str, language: &str) -> SubtitleCandidate {
        SubtitleCandidate {
            provider: provider.to_string(),
            id: "id".to_string(),
            language: language.to_string(),
            format: "srt".to_string(),
            release_name: String::new(),
            uploader_trusted: false,
            machine_translated: false,
            mt_confidence: 0,
            flags: CandidateFlags::default(),
        }
    }

    fn query(language: &str) -> SubtitleQuery {
        SubtitleQuery {
            title: "Some Movie".to_string(),
            language: language.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_computeScore_withIdenticalInputs_shouldBeDeterministic() {
        let engine = engine();
        let reputation = empty_reputation();
        let cand = candidate("p", "de");
        let q = query("de");

        let first = engine.compute_score(&cand, &q, &reputation);
        let second = engine.compute_score(&cand, &q, &reputation);
        assert_eq!(first, second);
    }

    #[test]
    fn test_computeScore_exactLanguage_shouldBeatBaseMatch() {
        let engine = engine();
        let reputation = empty_reputation();
        let q = query("pt-BR");

        let exact = engine.compute_score(&candidate("p", "pt-BR"), &q, &reputation);
        let base = engine.compute_score(&candidate("p", "pt"), &q, &reputation);
        assert!(exact > base);
        assert!(base > 0);
    }

    #[test]
    fn test_computeScore_crossingMtThreshold_shouldSubtractExactlyPenalty() {
        let config = ScoringConfig {
            mt_penalty: 15,
            mt_confidence_threshold: 80,
            ..Default::default()
        };
        let engine = ScoringEngine::new(config);
        let reputation = empty_reputation();
        let q = query("de");

        let mut below = candidate("p", "de");
        below.mt_confidence = 79;
        let mut at = candidate("p", "de");
        at.mt_confidence = 80;

        let score_below = engine.compute_score(&below, &q, &reputation);
        let score_at = engine.compute_score(&at, &q, &reputation);
        assert_eq!(score_below - score_at, 15);
    }

    #[test]
    fn test_computeScore_withZeroPenalty_shouldIgnoreConfidenceEntirely() {
        let config = ScoringConfig {
            mt_penalty: 0,
            ..Default::default()
        };
        let engine = ScoringEngine::new(config);
        let reputation = empty_reputation();
        let q = query("de");

        let mut low = candidate("p", "de");
        low.mt_confidence = 0;
        let mut high = candidate("p", "de");
        high.mt_confidence = 100;
        high.machine_translated = true;

        assert_eq!(
            engine.compute_score(&low, &q, &reputation),
            engine.compute_score(&high, &q, &reputation)
        );
    }

    #[test]
    fn test_computeScore_withFlaggedCandidate_shouldApplyPenaltyRegardlessOfConfidence() {
        let engine = engine();
        let reputation = empty_reputation();
        let q = query("de");

        let plain = candidate("p", "de");
        let mut flagged = candidate("p", "de");
        flagged.machine_translated = true;
        flagged.mt_confidence = 0;

        let diff = engine.compute_score(&plain, &q, &reputation)
            - engine.compute_score(&flagged, &q, &reputation);
        assert_eq!(diff, ScoringConfig::default().mt_penalty);
    }

    #[test]
    fn test_computeScore_withReputationModifier_shouldAddIt() {
        let engine = engine();
        let reputation = empty_reputation();
        reputation.refresh_with(HashMap::from([("p".to_string(), 10)]));

        let with = engine.compute_score(&candidate("p", "de"), &query("de"), &reputation);
        let without = engine.compute_score(&candidate("other", "de"), &query("de"), &reputation);
        assert_eq!(with - without, 10);
    }

    #[test]
    fn test_rank_withEqualScores_shouldBreakTiesByConfiguredPriority() {
        let engine = engine();
        let reputation = empty_reputation();
        let q = query("de");

        let candidates = vec![candidate("low-prio", "de"), candidate("high-prio", "de")];
        let priorities = HashMap::from([
            ("low-prio".to_string(), 20u32),
            ("high-prio".to_string(), 1u32),
        ]);

        let ranked = engine.rank(candidates, &q, &reputation, &priorities);
        assert_eq!(ranked[0].candidate.provider, "high-prio");
        assert_eq!(ranked[0].score, ranked[1].score);
    }

    #[test]
    fn test_rank_shouldOrderByScoreDescending() {
        let engine = engine();
        let reputation = empty_reputation();
        let q = query("de");

        let mut trusted = candidate("p", "de");
        trusted.uploader_trusted = true;

        let ranked = engine.rank(
            vec![candidate("p", "fr"), trusted, candidate("p", "de")],
            &q,
            &reputation,
            &HashMap::new(),
        );

        assert!(ranked[0].candidate.uploader_trusted);
        assert_eq!(ranked[2].candidate.language, "fr");
    }
}
