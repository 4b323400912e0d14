// src/storage/memory.rs

// In-memory link store. State lives for the lifetime of the process.
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, ShortenerError};
use crate::link_event;
use crate::storage::{LinkRecord, LinkSnapshot, LinkStore, LinkSummary};

/// Entry in the in-memory store
#[derive(Debug)]
struct StoredLink {
    record: LinkRecord,
    /// Insertion sequence; defines storage order
    seq: u64,
}

#[derive(Debug, Default)]
struct Links {
    by_code: HashMap<String, StoredLink>,
    next_seq: u64,
}

impl Links {
    /// Entries in storage (insertion) order
    fn in_storage_order(&self) -> Vec<&StoredLink> {
        let mut stored: Vec<&StoredLink> = self.by_code.values().collect();
        stored.sort_by_key(|link| link.seq);
        stored
    }
}

/// In-memory link store
///
/// One lock guards the whole map, so `create`'s existence check and insert
/// cannot interleave with another mutation.
#[derive(Debug, Clone)]
pub struct MemoryStore<C: Clock = SystemClock> {
    links: Arc<RwLock<Links>>,
    clock: C,
}

impl MemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            links: Arc::new(RwLock::new(Links::default())),
            clock,
        }
    }

    /// Number of stored records, including expired ones not yet collected
    pub fn len(&self) -> usize {
        self.links.read().by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if a record is live, removing it if it has expired
    fn check_expiry(&self, code: &str) -> Option<LinkRecord> {
        let now = self.clock.now();
        {
            let links = self.links.read();
            match links.by_code.get(code) {
                None => return None,
                Some(stored) if !stored.record.is_expired_at(now) => {
                    return Some(stored.record.clone())
                }
                Some(_) => {}
            }
        }

        // Expired under the read lock. Re-check under the write lock, since the
        // code may have been deleted and re-created in between.
        let mut links = self.links.write();
        let still_expired = links
            .by_code
            .get(code)
            .is_some_and(|stored| stored.record.is_expired_at(now));
        if still_expired {
            links.by_code.remove(code);
            link_event!("expire", code);
            return None;
        }
        links.by_code.get(code).map(|stored| stored.record.clone())
    }
}

#[async_trait]
impl<C: Clock> LinkStore for MemoryStore<C> {
    async fn create(&self, code: &str, long_url: &str, ttl_seconds: u64) -> Result<LinkRecord> {
        let now = self.clock.now();
        let mut links = self.links.write();

        if let Some(existing) = links.by_code.get(code) {
            if !existing.record.is_expired_at(now) {
                return Err(ShortenerError::CodeTaken(code.to_string()));
            }
            // an expired holder of the code is collected and replaced
            link_event!("expire", code);
        }

        let record = LinkRecord::new(code, long_url, ttl_seconds, now);
        let seq = links.next_seq;
        links.next_seq += 1;
        links.by_code.insert(
            code.to_string(),
            StoredLink {
                record: record.clone(),
                seq,
            },
        );
        link_event!("create", code);

        Ok(record)
    }

    async fn lookup(&self, code: &str) -> Result<Option<LinkRecord>> {
        Ok(self.check_expiry(code))
    }

    async fn record_hit(&self, code: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let mut links = self.links.write();

        match links.by_code.get_mut(code) {
            None => return Ok(None),
            Some(stored) if !stored.record.is_expired_at(now) => {
                stored.record.clicks += 1;
                return Ok(Some(stored.record.long_url.clone()));
            }
            Some(_) => {}
        }

        links.by_code.remove(code);
        link_event!("expire", code);
        Ok(None)
    }

    async fn exists(&self, code: &str) -> Result<bool> {
        Ok(self.check_expiry(code).is_some())
    }

    async fn delete(&self, code: &str) -> Result<bool> {
        let removed = self.links.write().by_code.remove(code).is_some();
        if removed {
            link_event!("delete", code);
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<()> {
        let mut links = self.links.write();
        let removed = links.by_code.len();
        links.by_code.clear();
        tracing::info!(removed, "Cleared link registry");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<LinkSnapshot>> {
        let now = self.clock.now();
        let links = self.links.read();

        let mut stored: Vec<&StoredLink> = links.by_code.values().collect();
        // newest first; seq breaks ties between records created in the same instant
        stored.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.seq.cmp(&a.seq))
        });

        Ok(stored
            .into_iter()
            .map(|link| LinkSnapshot {
                record: link.record.clone(),
                expired: link.record.is_expired_at(now),
            })
            .collect())
    }

    async fn summary(&self) -> Result<LinkSummary> {
        let now = self.clock.now();
        let links = self.links.read();

        let mut summary = LinkSummary {
            total_count: links.by_code.len(),
            ..LinkSummary::default()
        };
        for link in links.in_storage_order() {
            let record = &link.record;
            summary.total_clicks += record.clicks;
            if !record.is_expired_at(now) {
                summary.active_count += 1;
            }
            // strictly greater: the first record in storage order wins a tie
            if record.clicks > summary.top_clicks {
                summary.top_clicks = record.clicks;
                summary.top_code = Some(record.code.clone());
            }
        }

        Ok(summary)
    }

    async fn top_links(&self, limit: usize) -> Result<Vec<LinkRecord>> {
        let now = self.clock.now();
        let links = self.links.read();

        let mut live: Vec<&LinkRecord> = links
            .in_storage_order()
            .into_iter()
            .map(|link| &link.record)
            .filter(|record| !record.is_expired_at(now))
            .collect();
        // stable sort keeps storage order among equal click counts
        live.sort_by(|a, b| b.clicks.cmp(&a.clicks));

        Ok(live.into_iter().take(limit).cloned().collect())
    }
}
