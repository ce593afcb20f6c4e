/*!
 * Candidate scoring and ranking.
 *
 * The scoring engine ranks subtitle search results with a deterministic
 * weighted score plus penalties and bonuses. Scoring is a pure function of
 * (candidate, query, cached config): identical inputs always yield identical
 * scores within a reputation-cache epoch, and ties are broken by configured
 * provider priority, never derived.
 */

mod engine;
mod reputation;

pub use engine::{ScoredCandidate, ScoringEngine};
pub use reputation::ReputationCache;
