/*!
 * Concurrent provider search gather.
 *
 * Searches every available provider in parallel with an independent
 * per-provider timeout, records outcomes in the health tracker, and hands
 * the combined candidate list back only once every provider has answered
 * or timed out. Ranking never starts before the gather completes.
 */

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use log::{debug, warn};

use crate::errors::ProviderError;
use crate::health::HealthTracker;

use super::{SubtitleCandidate, SubtitleProvider, SubtitleQuery};

/// Outcome of the gather: all candidates from all responding providers,
/// plus the per-provider errors for the diagnostic trail.
#[derive(Debug, Default)]
pub struct GatherResult {
    /// Candidates from every provider that answered in time
    pub candidates: Vec<SubtitleCandidate>,

    /// Providers that failed or timed out, with the error
    pub failures: Vec<(String, ProviderError)>,

    /// Providers skipped because the circuit breaker has them disabled
    pub skipped_disabled: Vec<String>,
}

/// Search all available providers concurrently.
///
/// Disabled providers are silently skipped, not errored. Availability is
/// resolved through one batched health-tracker call for the whole provider
/// set rather than one call per provider.
pub async fn gather_candidates(
    providers: &[Arc<dyn SubtitleProvider>],
    query: &SubtitleQuery,
    timeout: Duration,
    health: &HealthTracker,
) -> GatherResult {
    let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
    let available = health.partition_available(&names);

    let mut result = GatherResult::default();
    let mut eligible = Vec::new();

    for provider in providers {
        if available.contains(provider.name()) {
            eligible.push(provider.clone());
        } else {
            debug!("Skipping disabled provider: {}", provider.name());
            result.skipped_disabled.push(provider.name().to_string());
        }
    }

    let timeout_ms = timeout.as_millis() as u64;
    let outcomes = stream::iter(eligible.into_iter())
        .map(|provider| {
            let query = query.clone();
            async move {
                let name = provider.name().to_string();
                let outcome = match tokio::time::timeout(timeout, provider.search(&query)).await {
                    Ok(Ok(candidates)) => Ok(candidates),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(ProviderError::Timeout(timeout_ms)),
                };
                (name, outcome)
            }
        })
        .buffer_unordered(providers.len().max(1))
        .collect::<Vec<_>>()
        .await;

    for (name, outcome) in outcomes {
        match outcome {
            Ok(candidates) => {
                debug!("Provider {} returned {} candidates", name, candidates.len());
                health.record_outcome(&name, true);
                result.candidates.extend(candidates);
            }
            Err(e) => {
                warn!("Provider {} search failed: {}", name, e);
                health.record_outcome(&name, false);
                result.failures.push((name, e));
            }
        }
    }

    result
}
