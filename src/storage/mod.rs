// src/storage/mod.rs

pub mod memory;

#[cfg(test)]
mod tests;

pub use memory::MemoryStore;

use super::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// One shortened link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub code: String,
    pub long_url: String,
    pub created_at: DateTime<Utc>,
    /// Requested lifetime; 0 means the link never expires
    pub ttl_seconds: u64,
    pub expires_at: Option<DateTime<Utc>>,
    pub clicks: u64,
}

impl LinkRecord {
    pub fn new(code: &str, long_url: &str, ttl_seconds: u64, now: DateTime<Utc>) -> Self {
        // A TTL too large to represent is treated as no expiry.
        let expires_at = if ttl_seconds > 0 {
            i64::try_from(ttl_seconds)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .and_then(|ttl| now.checked_add_signed(ttl))
        } else {
            None
        };

        Self {
            code: code.to_string(),
            long_url: long_url.to_string(),
            created_at: now,
            ttl_seconds,
            expires_at,
            clicks: 0,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if now > expires_at)
    }
}

/// Listing entry; `expired` marks records past their expiry that no lookup has collected yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    #[serde(flatten)]
    pub record: LinkRecord,
    pub expired: bool,
}

/// Aggregate view over the whole registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSummary {
    pub total_count: usize,
    pub total_clicks: u64,
    pub active_count: usize,
    pub top_code: Option<String>,
    pub top_clicks: u64,
}

/// Core trait that all link stores must implement
///
/// A record is live when it is present and not past its expiry. Expired
/// records are only removed when an operation touches them.
#[async_trait]
pub trait LinkStore: Send + Sync + Debug {
    /// Stores a new record, failing with `CodeTaken` if `code` is live
    async fn create(&self, code: &str, long_url: &str, ttl_seconds: u64) -> Result<LinkRecord>;

    /// Returns the live record for `code`, collecting it if it has expired
    async fn lookup(&self, code: &str) -> Result<Option<LinkRecord>>;

    /// Adds one click to a live record and returns its current destination,
    /// or `None` when no live record holds `code`
    async fn record_hit(&self, code: &str) -> Result<Option<String>>;

    /// Checks if a live record exists
    async fn exists(&self, code: &str) -> Result<bool>;

    /// Removes a record, live or not; returns whether one was present
    async fn delete(&self, code: &str) -> Result<bool>;

    /// Removes every record
    async fn clear(&self) -> Result<()>;

    /// All stored records, newest first. Does not collect expired records.
    async fn list(&self) -> Result<Vec<LinkSnapshot>>;

    /// Totals and the most clicked record. Does not collect expired records.
    async fn summary(&self) -> Result<LinkSummary>;

    /// Up to `limit` records with the most clicks, most clicked first
    async fn top_links(&self, limit: usize) -> Result<Vec<LinkRecord>>;
}
