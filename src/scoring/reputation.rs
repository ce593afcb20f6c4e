/*!
 * TTL-cached provider reputation aggregate.
 *
 * The scoring engine reads a per-provider reputation modifier from this
 * cache. It is explicit injected state with an expiry check, never an
 * ambient global: callers own the instance and decide when to refresh it
 * from the health tracker's batched stats.
 */

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::RwLock;

use crate::health::ProviderHealthStat;

/// Providers with fewer recorded usages than this get a neutral modifier.
const MIN_SAMPLES_FOR_MODIFIER: u64 = 5;

struct Snapshot {
    taken_at: Instant,
    modifiers: HashMap<String, i32>,
}

/// TTL-cached aggregate of per-provider reputation modifiers.
pub struct ReputationCache {
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

impl ReputationCache {
    /// Create an empty cache with the given TTL (default 60 s in config).
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            snapshot: RwLock::new(None),
        }
    }

    /// Whether the current snapshot is still within its TTL.
    pub fn is_fresh(&self) -> bool {
        self.snapshot
            .read()
            .as_ref()
            .is_some_and(|s| s.taken_at.elapsed() < self.ttl)
    }

    /// Reputation modifier for a provider; 0 when the snapshot is missing,
    /// expired, or does not know the name.
    pub fn modifier_for(&self, provider: &str) -> i32 {
        let snapshot = self.snapshot.read();
        match snapshot.as_ref() {
            Some(s) if s.taken_at.elapsed() < self.ttl => {
                s.modifiers.get(provider).copied().unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Replace the snapshot with precomputed modifiers, starting a new epoch.
    pub fn refresh_with(&self, modifiers: HashMap<String, i32>) {
        debug!("Refreshing reputation cache ({} providers)", modifiers.len());
        *self.snapshot.write() = Some(Snapshot {
            taken_at: Instant::now(),
            modifiers,
        });
    }

    /// Recompute the snapshot from batched health stats.
    pub fn refresh_from_stats(&self, stats: &HashMap<String, ProviderHealthStat>) {
        let modifiers = stats
            .iter()
            .map(|(name, stat)| (name.clone(), Self::modifier_from_stat(stat)))
            .collect();
        self.refresh_with(modifiers);
    }

    /// Refresh from stats only if the snapshot is missing or expired.
    pub fn refresh_if_stale(&self, stats: &HashMap<String, ProviderHealthStat>) {
        if !self.is_fresh() {
            self.refresh_from_stats(stats);
        }
    }

    /// Deterministic modifier derivation from a health stat.
    fn modifier_from_stat(stat: &ProviderHealthStat) -> i32 {
        if stat.total_searches < MIN_SAMPLES_FOR_MODIFIER {
            return 0;
        }

        let rate = stat.success_rate();
        if rate >= 0.9 {
            10
        } else if rate >= 0.75 {
            5
        } else if rate >= 0.5 {
            0
        } else if rate >= 0.25 {
            -5
        } else {
            -10
        }
    }
}
