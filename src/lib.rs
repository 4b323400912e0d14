// library entry
pub mod admission;
pub mod allocator;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod service;
pub mod storage;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;

// Re-export key components for convenience
pub use admission::{AdmissionPolicy, AdmissionStatus, TokenBucket};
pub use cache::RecencyCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ShortenerConfig;
pub use error::{Result, ShortenerError};
pub use logging::init as init_logging;
pub use service::{CreatedLink, LinkService};
pub use storage::{LinkRecord, LinkSnapshot, LinkStore, LinkSummary, MemoryStore};
