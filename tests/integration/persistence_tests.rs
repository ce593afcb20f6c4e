/*!
 * Repository round trips feeding live components: health counters that
 * survive a restart and glossaries loaded into a pipeline.
 */

use std::collections::HashMap;

use subwarden::app_config::HealthConfig;
use subwarden::database::Repository;
use subwarden::health::HealthTracker;
use subwarden::translation::{GlossaryEntry, GlossaryScope};

#[tokio::test]
async fn test_healthStats_persistedAcrossRestart_shouldKeepBreakerOpen() {
    let config = HealthConfig {
        min_samples: 10,
        success_rate_floor: 0.3,
        cooldown_secs: 3600,
    };

    // First process: a provider fails its way into an open breaker
    let tracker = HealthTracker::new(config.clone());
    for _ in 0..10 {
        tracker.record_outcome("flaky", false);
    }
    tracker.record_outcome("solid", true);
    assert!(!tracker.is_available("flaky"));

    let repo = Repository::new_in_memory().expect("Failed to create repository");
    repo.save_health_stats(&tracker.get_all_stats())
        .await
        .expect("Failed to persist health stats");

    // Second process: a fresh tracker seeded from the repository
    let restarted = HealthTracker::new(config);
    restarted.load_stats(repo.load_health_stats().await.expect("Load failed"));

    assert!(!restarted.is_available("flaky"));
    assert!(restarted.is_available("solid"));
    assert_eq!(restarted.get_stats("flaky").unwrap().total_searches, 10);
    assert_eq!(restarted.get_stats("solid").unwrap().successful_downloads, 1);
}

#[test]
fn test_glossaries_loadedFromRepository_shouldSplitByScope() {
    tokio_test::block_on(async {
        let repo = Repository::new_in_memory().expect("Failed to create repository");

        repo.save_glossary_entry(
            &GlossaryEntry::new("Sensei", "Meister", GlossaryScope::Global),
            None,
        )
        .await
        .expect("Save failed");
        repo.save_glossary_entry(
            &GlossaryEntry::new("Nakama", "Kameraden", GlossaryScope::Series),
            Some("one-piece"),
        )
        .await
        .expect("Save failed");
        repo.save_glossary_entry(
            &GlossaryEntry::new("Sensei", "Lehrer", GlossaryScope::Series),
            Some("one-piece"),
        )
        .await
        .expect("Save failed");

        // Startup sequence: load global once, then per-series sets
        let global = repo.global_glossary().await.expect("Load failed");
        let mut series = HashMap::new();
        series.insert(
            "one-piece".to_string(),
            repo.series_glossary("one-piece").await.expect("Load failed"),
        );

        assert_eq!(global.len(), 1);
        assert_eq!(global[0].target_term, "Meister");

        let entries = &series["one-piece"];
        assert_eq!(entries.len(), 2);
        // Ordered by lower-cased source term
        assert_eq!(entries[0].source_term, "Nakama");
        assert_eq!(entries[1].source_term, "Sensei");
        assert_eq!(entries[1].target_term, "Lehrer");
        assert!(entries.iter().all(|e| e.scope == GlossaryScope::Series));
    });
}
