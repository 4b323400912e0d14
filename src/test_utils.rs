// src/test_utils.rs

use chrono::{TimeZone, Utc};

use crate::admission::{AdmissionPolicy, TokenBucket};
use crate::cache::RecencyCache;
use crate::clock::ManualClock;
use crate::config::{ShortenerConfig, TokenBucketConfig};
use crate::service::LinkService;
use crate::storage::MemoryStore;

pub type TestService = LinkService<MemoryStore<ManualClock>, TokenBucket<ManualClock>>;

/// Fixed starting instant so test output is reproducible
pub fn test_clock() -> ManualClock {
    ManualClock::starting_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
}

/// Token bucket driven by a clock the test controls
pub fn create_test_bucket(config: TokenBucketConfig) -> (TokenBucket<ManualClock>, ManualClock) {
    let clock = test_clock();
    (TokenBucket::with_clock(config, clock.clone()), clock)
}

/// Service with default configuration on a manual clock
pub fn create_test_service() -> (TestService, ManualClock) {
    create_test_service_with(&ShortenerConfig::default())
}

pub fn create_test_service_with(config: &ShortenerConfig) -> (TestService, ManualClock) {
    let clock = test_clock();
    let service = LinkService::new(
        MemoryStore::with_clock(clock.clone()),
        TokenBucket::with_clock(config.admission.clone(), clock.clone()),
        RecencyCache::from_config(&config.cache),
        &config.base_url,
    );
    (service, clock)
}

/// Issues `requests` back-to-back checks for `client_id` and counts the admitted ones
pub async fn count_admitted<A: AdmissionPolicy>(policy: &A, client_id: &str, requests: usize) -> usize {
    let mut allowed_count = 0;
    for _ in 0..requests {
        if policy.allow(client_id).await {
            allowed_count += 1;
        }
    }
    allowed_count
}
