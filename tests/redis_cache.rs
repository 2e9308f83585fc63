//! Cache behavior against a live Redis instance.
//!
//! Skipped unless `TEST_REDIS_URL` points at a disposable Redis; the single
//! cache key is process-global, so everything runs in one test fn.

use async_trait::async_trait;
use kurs_bot::bot::handlers::{resolve_rate, RateOutcome};
use kurs_bot::cache::RateCache;
use kurs_bot::rates::RateSource;

struct NeverRates;

#[async_trait]
impl RateSource for NeverRates {
    async fn fetch_usd_rate(&self) -> Option<f64> {
        panic!("fetch must not run while the cache holds a value");
    }
}

#[tokio::test]
async fn test_cache_round_trip_and_short_circuit() {
    let url = match std::env::var("TEST_REDIS_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("Skipping Redis integration test: TEST_REDIS_URL not set");
            return;
        }
    };

    let cache = RateCache::connect(&url).await;
    assert!(cache.is_connected());

    // Idempotence: setting the same value twice keeps it readable until expiry
    cache.set(91.10).await;
    cache.set(91.10).await;
    assert_eq!(cache.get().await, Some(91.10));

    // A cached value short-circuits the fetch entirely
    let outcome = resolve_rate(&cache, &NeverRates).await;
    assert_eq!(outcome, RateOutcome::Cached(91.10));
}
