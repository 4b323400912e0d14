// src/service.rs

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

use crate::admission::{AdmissionPolicy, TokenBucket};
use crate::allocator::CodeAllocator;
use crate::cache::RecencyCache;
use crate::config::ShortenerConfig;
use crate::error::{Result, ShortenerError};
use crate::link_event;
use crate::storage::{LinkRecord, LinkSnapshot, LinkStore, LinkSummary, MemoryStore};

/// Result of a successful `create_link`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedLink {
    pub code: String,
    pub short_url: String,
    pub record: LinkRecord,
}

/// The link registry and access-control layer.
///
/// Built once at startup and shared (usually behind an `Arc`) by every
/// request handler. Arguments are expected to be validated already: URLs are
/// well formed and aliases respect the code charset and length.
#[derive(Debug)]
pub struct LinkService<S = MemoryStore, A = TokenBucket>
where
    S: LinkStore,
    A: AdmissionPolicy,
{
    allocator: CodeAllocator,
    store: S,
    cache: RecencyCache,
    admission: A,
    base_url: String,
}

impl LinkService<MemoryStore, TokenBucket> {
    /// In-memory service on the system clock
    pub fn from_config(config: &ShortenerConfig) -> Result<Self> {
        config.validate()?;

        let mut admission = TokenBucket::new(config.admission.clone());
        if config.reclamation.enabled {
            admission = admission.with_idle_timeout(config.reclamation.idle_timeout);
        }

        Ok(Self::new(
            MemoryStore::new(),
            admission,
            RecencyCache::from_config(&config.cache),
            &config.base_url,
        ))
    }
}

impl<S, A> LinkService<S, A>
where
    S: LinkStore,
    A: AdmissionPolicy,
{
    pub fn new(store: S, admission: A, cache: RecencyCache, base_url: &str) -> Self {
        Self {
            allocator: CodeAllocator::new(),
            store,
            cache,
            admission,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Registers `long_url` under `custom_alias`, or under a freshly allocated code
    pub async fn create_link(
        &self,
        long_url: &str,
        custom_alias: Option<&str>,
        ttl_seconds: u64,
    ) -> Result<CreatedLink> {
        let code = match custom_alias {
            Some(alias) => alias.to_string(),
            None => self.allocator.allocate(),
        };

        let record = self.store.create(&code, long_url, ttl_seconds).await?;
        // drop anything a concurrent resolve cached for an earlier holder of this code
        self.cache.remove(&code);

        Ok(CreatedLink {
            short_url: self.short_url(&code),
            code,
            record,
        })
    }

    /// Destination for `code`, recording a click
    pub async fn resolve_link(&self, code: &str) -> Result<String> {
        let cached = self.cache.get(code);

        // The registry is consulted on every resolve, cache hit or not: it counts
        // the click and its answer replaces whatever the cache held. A cache entry
        // left behind by a delete, an expiry or a re-registration of the code is
        // corrected on its next hit.
        let Some(long_url) = self.store.record_hit(code).await? else {
            if cached.is_some() {
                self.cache.remove(code);
            }
            return Err(ShortenerError::NotFound(code.to_string()));
        };

        if cached.as_deref() != Some(long_url.as_str()) {
            self.cache.put(code, &long_url);
        }
        Ok(long_url)
    }

    /// Removes the link; returns whether one was present
    pub async fn delete_link(&self, code: &str) -> Result<bool> {
        let deleted = self.store.delete(code).await?;
        self.cache.remove(code);
        Ok(deleted)
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.store.clear().await?;
        self.cache.clear();
        link_event!("clear", "*");
        Ok(())
    }

    /// Every stored link, newest first
    pub async fn list_links(&self) -> Result<Vec<LinkSnapshot>> {
        self.store.list().await
    }

    pub async fn get_summary(&self) -> Result<LinkSummary> {
        self.store.summary().await
    }

    /// Most clicked live links, most clicked first
    pub async fn top_links(&self, limit: usize) -> Result<Vec<LinkRecord>> {
        self.store.top_links(limit).await
    }

    /// Whether `client_id` may perform a write-type operation now
    pub async fn check_admission(&self, client_id: &str) -> bool {
        self.admission.allow(client_id).await
    }

    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &RecencyCache {
        &self.cache
    }

    pub fn admission(&self) -> &A {
        &self.admission
    }
}

impl<S, A> LinkService<S, A>
where
    S: LinkStore + 'static,
    A: AdmissionPolicy + 'static,
{
    /// Periodically drops idle admission buckets until the returned task is aborted
    pub fn spawn_reclaimer(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = time::interval(every);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                service.admission.reclaim_idle().await;
            }
        })
    }
}
