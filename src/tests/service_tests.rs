// src/tests/service_tests.rs

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

use crate::admission::TokenBucket;
use crate::allocator::base62;
use crate::cache::RecencyCache;
use crate::clock::ManualClock;
use crate::config::{ShortenerConfig, TokenBucketConfig};
use crate::error::{Result, ShortenerError};
use crate::storage::{LinkRecord, LinkSnapshot, LinkStore, LinkSummary, MemoryStore};
use crate::test_utils::{create_test_service, create_test_service_with, test_clock};
use crate::LinkService;

/// Store that, once armed, re-registers "promo" right after serving a hit on it,
/// as if another request had deleted and re-created the alias in between
#[derive(Debug)]
struct ReRegisteringStore {
    inner: MemoryStore<ManualClock>,
    armed: AtomicBool,
}

#[async_trait]
impl LinkStore for ReRegisteringStore {
    async fn create(&self, code: &str, long_url: &str, ttl_seconds: u64) -> Result<LinkRecord> {
        self.inner.create(code, long_url, ttl_seconds).await
    }

    async fn lookup(&self, code: &str) -> Result<Option<LinkRecord>> {
        self.inner.lookup(code).await
    }

    async fn record_hit(&self, code: &str) -> Result<Option<String>> {
        let hit = self.inner.record_hit(code).await?;
        if code == "promo" && self.armed.swap(false, Ordering::SeqCst) {
            self.inner.delete("promo").await?;
            self.inner.create("promo", "https://new.example", 0).await?;
        }
        Ok(hit)
    }

    async fn exists(&self, code: &str) -> Result<bool> {
        self.inner.exists(code).await
    }

    async fn delete(&self, code: &str) -> Result<bool> {
        self.inner.delete(code).await
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }

    async fn list(&self) -> Result<Vec<LinkSnapshot>> {
        self.inner.list().await
    }

    async fn summary(&self) -> Result<LinkSummary> {
        self.inner.summary().await
    }

    async fn top_links(&self, limit: usize) -> Result<Vec<LinkRecord>> {
        self.inner.top_links(limit).await
    }
}

// Create, resolve repeatedly, clear, resolve again
#[tokio::test]
async fn test_end_to_end_scenario() {
    let (service, clock) = create_test_service();

    let created = service
        .create_link("https://example.com", None, 0)
        .await
        .unwrap();
    assert_eq!(created.code, "1");
    assert_eq!(created.short_url, "http://localhost:3000/1");

    for _ in 0..5 {
        assert_eq!(
            service.resolve_link(&created.code).await.unwrap(),
            "https://example.com"
        );
        clock.advance(Duration::from_secs(60 * 60 * 24));
    }

    service.clear_all().await.unwrap();

    assert_eq!(
        service.resolve_link(&created.code).await,
        Err(ShortenerError::NotFound(created.code.clone()))
    );
    assert!(service.cache().is_empty());
}

// Generated codes are consecutive base-62 integers
#[tokio::test]
async fn test_generated_codes_are_sequential() {
    let (service, _clock) = create_test_service();

    let mut codes = Vec::new();
    for i in 0..100 {
        let created = service
            .create_link(&format!("https://example.com/{}", i), None, 0)
            .await
            .unwrap();
        codes.push(created.code);
    }

    let decoded: Vec<u64> = codes.iter().map(|c| base62::decode(c).unwrap()).collect();
    assert_eq!(decoded, (1..=100).collect::<Vec<_>>());
    assert_eq!(codes[9], "a");
    assert_eq!(codes[61], "10");
}

#[tokio::test]
async fn test_custom_alias_conflict() {
    let (service, _clock) = create_test_service();

    service
        .create_link("https://example.com/a", Some("launch"), 0)
        .await
        .unwrap();
    service.resolve_link("launch").await.unwrap();

    let second = service
        .create_link("https://example.com/b", Some("launch"), 0)
        .await;
    assert_eq!(second, Err(ShortenerError::CodeTaken("launch".to_string())));

    // deleting frees the alias straight away
    assert!(service.delete_link("launch").await.unwrap());
    let recreated = service
        .create_link("https://example.com/b", Some("launch"), 0)
        .await
        .unwrap();
    assert_eq!(recreated.record.long_url, "https://example.com/b");
    assert_eq!(
        service.resolve_link("launch").await.unwrap(),
        "https://example.com/b"
    );
}

// An alias squatting on the next generated code is reported, not overwritten
#[tokio::test]
async fn test_generated_code_collision_with_alias() {
    let (service, _clock) = create_test_service();
    service
        .create_link("https://example.com/alias", Some("1"), 0)
        .await
        .unwrap();

    let collided = service.create_link("https://example.com/gen", None, 0).await;
    assert_eq!(collided, Err(ShortenerError::CodeTaken("1".to_string())));

    // the counter moved on, so the next attempt succeeds
    let created = service
        .create_link("https://example.com/gen", None, 0)
        .await
        .unwrap();
    assert_eq!(created.code, "2");
    assert_eq!(
        service.resolve_link("1").await.unwrap(),
        "https://example.com/alias"
    );
}

// Deleting a cached link must not leave a stale redirect behind
#[tokio::test]
async fn test_delete_invalidates_cache() {
    let (service, _clock) = create_test_service();
    let created = service
        .create_link("https://example.com", None, 0)
        .await
        .unwrap();

    service.resolve_link(&created.code).await.unwrap();
    assert!(service.cache().contains(&created.code));

    assert!(service.delete_link(&created.code).await.unwrap());
    assert!(!service.cache().contains(&created.code));
    assert_eq!(
        service.resolve_link(&created.code).await,
        Err(ShortenerError::NotFound(created.code.clone()))
    );

    assert!(!service.delete_link(&created.code).await.unwrap());
}

// Deleting through the store directly leaves the cache stale; resolve still notices
#[tokio::test]
async fn test_stale_cache_entry_is_detected() {
    let (service, _clock) = create_test_service();
    service
        .create_link("https://example.com", Some("racy"), 0)
        .await
        .unwrap();
    service.resolve_link("racy").await.unwrap();

    service.store().delete("racy").await.unwrap();
    assert!(service.cache().contains("racy"));

    assert_eq!(
        service.resolve_link("racy").await,
        Err(ShortenerError::NotFound("racy".to_string()))
    );
    assert!(!service.cache().contains("racy"));
}

// An alias re-registered while its old target is being cached ends up serving the new target
#[tokio::test]
async fn test_reregistered_alias_replaces_cached_target() {
    let clock = test_clock();
    let store = ReRegisteringStore {
        inner: MemoryStore::with_clock(clock.clone()),
        armed: AtomicBool::new(false),
    };
    let service = LinkService::new(
        store,
        TokenBucket::with_clock(TokenBucketConfig::default(), clock),
        RecencyCache::new(10),
        "http://localhost:3000",
    );
    service
        .create_link("https://old.example", Some("promo"), 0)
        .await
        .unwrap();
    service.store().armed.store(true, Ordering::SeqCst);

    // served before the re-registration took effect
    assert_eq!(
        service.resolve_link("promo").await.unwrap(),
        "https://old.example"
    );

    for _ in 0..3 {
        assert_eq!(
            service.resolve_link("promo").await.unwrap(),
            "https://new.example"
        );
    }
    assert_eq!(service.cache().get("promo").as_deref(), Some("https://new.example"));

    let record = service.store().lookup("promo").await.unwrap().unwrap();
    assert_eq!(record.long_url, "https://new.example");
    assert_eq!(record.clicks, 3);
}

// A cached link past its TTL is not served from the cache
#[tokio::test]
async fn test_expired_link_is_not_served_from_cache() {
    let (service, clock) = create_test_service();
    let created = service
        .create_link("https://example.com/flash", None, 1)
        .await
        .unwrap();

    assert_eq!(
        service.resolve_link(&created.code).await.unwrap(),
        "https://example.com/flash"
    );
    assert!(service.cache().contains(&created.code));

    clock.advance(Duration::from_millis(1100));

    assert_eq!(
        service.resolve_link(&created.code).await,
        Err(ShortenerError::NotFound(created.code.clone()))
    );
    assert!(!service.cache().contains(&created.code));
    assert!(service.list_links().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_code_is_not_found() {
    let (service, _clock) = create_test_service();
    assert_eq!(
        service.resolve_link("nope").await,
        Err(ShortenerError::NotFound("nope".to_string()))
    );
    assert!(service.cache().is_empty());
}

// Clicks are counted on cache hits and misses alike
#[tokio::test]
async fn test_click_accounting_and_summary() {
    let (service, _clock) = create_test_service();
    let quiet = service
        .create_link("https://example.com/quiet", None, 0)
        .await
        .unwrap();
    let popular = service
        .create_link("https://example.com/popular", None, 0)
        .await
        .unwrap();

    service.resolve_link(&quiet.code).await.unwrap();
    for _ in 0..4 {
        service.resolve_link(&popular.code).await.unwrap();
    }

    let summary = service.get_summary().await.unwrap();
    assert_eq!(summary.total_count, 2);
    assert_eq!(summary.total_clicks, 5);
    assert_eq!(summary.active_count, 2);
    assert_eq!(summary.top_code.as_deref(), Some(popular.code.as_str()));
    assert_eq!(summary.top_clicks, 4);

    let listed = service.list_links().await.unwrap();
    assert_eq!(listed[0].record.code, popular.code);
    assert_eq!(listed[0].record.clicks, 4);
    assert_eq!(listed[1].record.clicks, 1);

    let top = service.top_links(1).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].code, popular.code);
}

#[tokio::test]
async fn test_cache_capacity_is_respected() {
    let mut config = ShortenerConfig::default();
    config.cache.capacity = 2;
    let (service, _clock) = create_test_service_with(&config);

    for code in ["a", "b", "c"] {
        service
            .create_link(&format!("https://example.com/{}", code), Some(code), 0)
            .await
            .unwrap();
        service.resolve_link(code).await.unwrap();
    }

    assert_eq!(service.cache().len(), 2);
    assert!(!service.cache().contains("a"));

    // evicted entries are still served from the registry
    assert_eq!(
        service.resolve_link("a").await.unwrap(),
        "https://example.com/a"
    );
}

#[tokio::test]
async fn test_check_admission() {
    let (service, clock) = create_test_service();

    let allowed = {
        let mut allowed = 0;
        for _ in 0..11 {
            if service.check_admission("198.51.100.1").await {
                allowed += 1;
            }
        }
        allowed
    };
    assert_eq!(allowed, 10);
    assert!(service.check_admission("198.51.100.2").await);

    clock.advance(Duration::from_secs(1));
    for _ in 0..3 {
        assert!(service.check_admission("198.51.100.1").await);
    }
}

#[tokio::test]
async fn test_base_url_trailing_slash_is_normalised() {
    let mut config = ShortenerConfig::default();
    config.base_url = "https://sho.rt/".to_string();
    let (service, _clock) = create_test_service_with(&config);

    assert_eq!(service.short_url("abc"), "https://sho.rt/abc");
}

#[tokio::test]
async fn test_from_config_rejects_invalid_config() {
    let mut config = ShortenerConfig::default();
    config.cache.capacity = 0;

    assert!(matches!(
        LinkService::from_config(&config),
        Err(ShortenerError::Config(_))
    ));
}

#[tokio::test]
async fn test_reclaimer_task_drops_idle_buckets() {
    let mut config = ShortenerConfig::default();
    config.reclamation.enabled = true;
    config.reclamation.idle_timeout = Duration::from_secs(4);
    let service = Arc::new(LinkService::from_config(&config).unwrap());

    assert!(service.check_admission("idle").await);
    assert_eq!(service.admission().tracked_clients(), 1);

    // real clock: wait past the idle timeout, then let one sweep run
    tokio::time::sleep(Duration::from_millis(4100)).await;
    let handle = service.spawn_reclaimer(Duration::from_millis(50));
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.abort();

    assert_eq!(service.admission().tracked_clients(), 0);
}

// Many tasks creating and resolving at once
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_and_resolve() {
    let (service, _clock) = create_test_service();
    let service = Arc::new(service);
    let tasks = 16;
    let barrier = Arc::new(Barrier::new(tasks));

    let handles = (0..tasks).map(|t| {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            barrier.wait().await;
            let mut codes = Vec::new();
            for i in 0..50 {
                let url = format!("https://example.com/{}/{}", t, i);
                let created = service.create_link(&url, None, 0).await.unwrap();
                assert_eq!(service.resolve_link(&created.code).await.unwrap(), url);
                codes.push(created.code);
            }
            codes
        })
    });

    let mut seen = HashSet::new();
    for codes in join_all(handles).await {
        for code in codes.unwrap() {
            assert!(seen.insert(code));
        }
    }

    let summary = service.get_summary().await.unwrap();
    assert_eq!(summary.total_count, tasks * 50);
    assert_eq!(summary.total_clicks, (tasks * 50) as u64);
    assert!(service.cache().len() <= service.cache().capacity());
}
