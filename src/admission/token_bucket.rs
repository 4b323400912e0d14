// src/admission/token_bucket.rs

use crate::admission::{AdmissionPolicy, AdmissionStatus};
use crate::admission_event;
use crate::clock::{elapsed_seconds, Clock, SystemClock};
use crate::config::TokenBucketConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;

/// Per-client bucket state
#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: DateTime<Utc>,
}

/// Token Bucket admission control
///
/// Each client has a bucket holding up to `capacity` tokens that refills at
/// `refill_rate` tokens per second. A request spends one token; with less than
/// one token available the request is denied. Refill is computed lazily at
/// each check from the time elapsed since the previous one.
///
/// A client's first request finds a full bucket and spends one token from it.
/// Buckets of different clients live in separate map entries, so checks for
/// different clients do not wait on each other.
#[derive(Debug)]
pub struct TokenBucket<C: Clock = SystemClock> {
    buckets: DashMap<String, Bucket>,

    /// Configuration for the token bucket
    config: TokenBucketConfig,

    /// Buckets idle longer than this are dropped by `reclaim_idle`
    idle_timeout: Option<Duration>,

    clock: C,
}

impl TokenBucket<SystemClock> {
    /// Creates a new token bucket with the given configuration
    pub fn new(config: TokenBucketConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> TokenBucket<C> {
    pub fn with_clock(config: TokenBucketConfig, clock: C) -> Self {
        Self {
            buckets: DashMap::new(),
            config,
            idle_timeout: None,
            clock,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = Some(idle_timeout);
        self
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    fn capacity(&self) -> f64 {
        self.config.capacity as f64
    }

    /// Calculate the token balance after refilling for the time since `last_refill`
    fn calculate_refill(&self, bucket: &Bucket, now: DateTime<Utc>) -> f64 {
        let elapsed = elapsed_seconds(bucket.last_refill, now);
        (bucket.tokens + elapsed * self.config.refill_rate).min(self.capacity())
    }

    /// Time until `tokens` grows to one whole token
    fn time_until_token(&self, tokens: f64) -> Duration {
        let missing = (1.0 - tokens).max(0.0);
        Duration::try_from_secs_f64(missing / self.config.refill_rate).unwrap_or(Duration::MAX)
    }
}

#[async_trait]
impl<C: Clock> AdmissionPolicy for TokenBucket<C> {
    async fn check(&self, client_id: &str) -> AdmissionStatus {
        let now = self.clock.now();

        // The entry guard holds the shard lock, so refill and consume happen as one step per client.
        let (allowed, remaining) = match self.buckets.entry(client_id.to_string()) {
            Entry::Vacant(slot) => {
                let remaining = self.capacity() - 1.0;
                slot.insert(Bucket {
                    tokens: remaining,
                    last_refill: now,
                });
                (true, remaining)
            }
            Entry::Occupied(mut slot) => {
                let refilled = self.calculate_refill(slot.get(), now);
                let bucket = slot.get_mut();
                // the refill is recorded whether or not the request is admitted
                bucket.last_refill = now;
                if refilled >= 1.0 {
                    bucket.tokens = refilled - 1.0;
                    (true, bucket.tokens)
                } else {
                    bucket.tokens = refilled;
                    (false, refilled)
                }
            }
        };

        admission_event!(client_id, allowed, remaining, self.config.capacity);

        AdmissionStatus {
            allowed,
            remaining,
            limit: self.config.capacity,
            retry_after: if allowed {
                Duration::ZERO
            } else {
                self.time_until_token(remaining)
            },
        }
    }

    async fn tokens(&self, client_id: &str) -> Option<f64> {
        let now = self.clock.now();
        self.buckets
            .get(client_id)
            .map(|bucket| self.calculate_refill(&bucket, now))
    }

    async fn reset(&self, client_id: &str) {
        self.buckets.remove(client_id);
    }

    async fn reclaim_idle(&self) -> usize {
        let Some(idle_timeout) = self.idle_timeout else {
            return 0;
        };

        let now = self.clock.now();
        let idle_secs = idle_timeout.as_secs_f64();
        let mut reclaimed = 0;
        self.buckets.retain(|_, bucket| {
            let keep = elapsed_seconds(bucket.last_refill, now) < idle_secs;
            if !keep {
                reclaimed += 1;
            }
            keep
        });

        if reclaimed > 0 {
            tracing::info!(reclaimed, "Reclaimed idle admission buckets");
        }
        reclaimed
    }
}
