// src/admission/mod.rs

pub mod token_bucket;

pub use token_bucket::TokenBucket;

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

#[cfg(test)]
mod tests;

/// Outcome of one admission check
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionStatus {
    /// Whether the request was admitted
    pub allowed: bool,

    /// Tokens left after this check (fractional)
    pub remaining: f64,

    /// Burst capacity of the bucket
    pub limit: u64,

    /// How long until one whole token is available; zero when allowed
    pub retry_after: Duration,
}

/// Core trait for per-client admission control
///
/// Denial is an ordinary outcome, not an error.
#[async_trait]
pub trait AdmissionPolicy: Send + Sync + Debug {
    /// Checks the client's budget and consumes one unit if it allows the request
    async fn check(&self, client_id: &str) -> AdmissionStatus;

    /// Convenience wrapper over [`AdmissionPolicy::check`]
    async fn allow(&self, client_id: &str) -> bool {
        self.check(client_id).await.allowed
    }

    /// Current balance for a client without consuming anything; `None` for unseen clients
    async fn tokens(&self, client_id: &str) -> Option<f64>;

    /// Forget a client's state; its next request is treated as its first
    async fn reset(&self, client_id: &str);

    /// Drop state for idle clients, returning how many were dropped
    async fn reclaim_idle(&self) -> usize;
}
