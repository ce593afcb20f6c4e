/*!
 * Provider and backend health tracking with circuit breaking.
 *
 * The tracker keeps rolling per-name success/failure stats and drives
 * auto-disable/re-enable decisions. A breaker opens only after a minimum
 * sample size shows the success rate below the configured floor, so one
 * early failure never disables a provider. After the cooldown elapses the
 * breaker half-opens on the next availability check and re-closes on the
 * next successful real outcome.
 *
 * Staleness note: cooldown expiry is refreshed on the next actual usage
 * (an availability check or a recorded outcome), never by a passive stat
 * read. `get_stats`/`get_all_stats` can therefore report `auto_disabled`
 * for a breaker whose cooldown has already elapsed. This is documented
 * behavior and is pinned by tests rather than "fixed".
 */

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::app_config::HealthConfig;

/// Circuit breaker state for one provider or backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    /// Requests flow normally
    Closed,
    /// Requests are blocked until the cooldown elapses
    Open,
    /// Cooldown elapsed; the next real attempt decides
    HalfOpen,
}

/// Rolling health statistics for one provider or backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealthStat {
    /// Provider/backend name (key)
    pub name: String,

    /// Total recorded usages (searches/requests)
    pub total_searches: u64,

    /// Recorded successful outcomes
    pub successful_downloads: u64,

    /// Whether the breaker currently has this name disabled
    pub auto_disabled: bool,

    /// When the current cooldown ends, if the breaker is open
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl ProviderHealthStat {
    /// Create an empty stat for a name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            total_searches: 0,
            successful_downloads: 0,
            auto_disabled: false,
            cooldown_until: None,
        }
    }

    /// Derived success rate; 1.0 when nothing has been recorded yet.
    pub fn success_rate(&self) -> f64 {
        if self.total_searches == 0 {
            return 1.0;
        }
        self.successful_downloads as f64 / self.total_searches as f64
    }
}

/// Internal record combining the stat with the breaker machinery.
#[derive(Debug, Clone)]
struct BreakerRecord {
    stat: ProviderHealthStat,
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<DateTime<Utc>>,
}

impl BreakerRecord {
    fn new(name: &str) -> Self {
        Self {
            stat: ProviderHealthStat::new(name),
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }
}

/// Thread-safe health tracker shared across concurrent pipeline runs.
pub struct HealthTracker {
    config: HealthConfig,
    records: RwLock<HashMap<String, BreakerRecord>>,
}

impl HealthTracker {
    /// Create a tracker with the given tunables.
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Record the outcome of a real usage (search or download attempt).
    pub fn record_outcome(&self, name: &str, success: bool) {
        let mut records = self.records.write();
        let record = records
            .entry(name.to_string())
            .or_insert_with(|| BreakerRecord::new(name));

        record.stat.total_searches += 1;

        let mut just_closed = false;
        if success {
            record.stat.successful_downloads += 1;
            record.consecutive_failures = 0;

            if record.state == BreakerState::HalfOpen {
                info!("Breaker for {} re-closed after successful probe", name);
                record.state = BreakerState::Closed;
                record.stat.auto_disabled = false;
                record.stat.cooldown_until = None;
                record.opened_at = None;
                just_closed = true;
            }
        } else {
            record.consecutive_failures += 1;

            if record.state == BreakerState::HalfOpen {
                warn!("Breaker probe for {} failed, re-opening", name);
                Self::open_breaker(record, &self.config);
                return;
            }
        }

        // Opening requires both the minimum sample size and a rate below the
        // floor. A breaker that just re-closed gets a fresh chance and is not
        // re-evaluated in the same call.
        if !just_closed
            && record.state == BreakerState::Closed
            && record.stat.total_searches >= self.config.min_samples
            && record.stat.success_rate() < self.config.success_rate_floor
        {
            warn!(
                "Auto-disabling {} (success rate {:.2} below floor {:.2} over {} samples)",
                name,
                record.stat.success_rate(),
                self.config.success_rate_floor,
                record.stat.total_searches
            );
            Self::open_breaker(record, &self.config);
        }
    }

    fn open_breaker(record: &mut BreakerRecord, config: &HealthConfig) {
        let now = Utc::now();
        record.state = BreakerState::Open;
        record.opened_at = Some(now);
        record.stat.auto_disabled = true;
        record.stat.cooldown_until = Some(now + ChronoDuration::seconds(config.cooldown_secs as i64));
    }

    /// Whether requests may currently be routed to `name`.
    ///
    /// An open breaker whose cooldown has elapsed transitions to half-open
    /// here; unknown names are available.
    pub fn is_available(&self, name: &str) -> bool {
        let mut records = self.records.write();
        match records.get_mut(name) {
            None => true,
            Some(record) => Self::check_available(record),
        }
    }

    fn check_available(record: &mut BreakerRecord) -> bool {
        match record.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = record
                    .stat
                    .cooldown_until
                    .is_none_or(|until| Utc::now() >= until);

                if elapsed {
                    debug!("Cooldown elapsed for {}, half-opening breaker", record.stat.name);
                    record.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Resolve availability for a whole provider set in one call.
    ///
    /// Callers evaluating N providers together must use this instead of N
    /// `is_available` calls; that O(1)-calls contract is part of the API,
    /// not an optimization detail.
    pub fn partition_available(&self, names: &[&str]) -> HashSet<String> {
        let mut records = self.records.write();
        names
            .iter()
            .filter(|name| match records.get_mut(**name) {
                None => true,
                Some(record) => Self::check_available(record),
            })
            .map(|name| (*name).to_string())
            .collect()
    }

    /// Passive stat read for one name. Does not refresh cooldown state.
    pub fn get_stats(&self, name: &str) -> Option<ProviderHealthStat> {
        self.records.read().get(name).map(|r| r.stat.clone())
    }

    /// Passive batched read returning every tracked name in one call.
    pub fn get_all_stats(&self) -> HashMap<String, ProviderHealthStat> {
        self.records
            .read()
            .iter()
            .map(|(name, record)| (name.clone(), record.stat.clone()))
            .collect()
    }

    /// Current breaker state for a name, if tracked.
    pub fn breaker_state(&self, name: &str) -> Option<BreakerState> {
        self.records.read().get(name).map(|r| r.state)
    }

    /// Seed the tracker from persisted stats (process restart).
    pub fn load_stats(&self, stats: Vec<ProviderHealthStat>) {
        let mut records = self.records.write();
        for stat in stats {
            let state = if stat.auto_disabled {
                BreakerState::Open
            } else {
                BreakerState::Closed
            };
            let record = BreakerRecord {
                opened_at: stat.cooldown_until.map(|until| {
                    until - ChronoDuration::seconds(self.config.cooldown_secs as i64)
                }),
                state,
                consecutive_failures: 0,
                stat: stat.clone(),
            };
            records.insert(stat.name.clone(), record);
        }
    }
}
