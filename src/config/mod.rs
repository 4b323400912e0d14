// src/config/mod.rs

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, ShortenerError};

/// Top-level configuration for the link service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenerConfig {
    /// Prefix used when formatting short URLs
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub admission: TokenBucketConfig,

    #[serde(default)]
    pub reclamation: ReclamationConfig,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cache: CacheConfig::default(),
            admission: TokenBucketConfig::default(),
            reclamation: ReclamationConfig::default(),
        }
    }
}

/// Configuration for the recency cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached code -> URL mappings
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_capacity() -> usize {
    100
}

// serde defaults only apply when deserializing, so Default mirrors them
impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

/// Configuration for token bucket admission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBucketConfig {
    /// Capacity of the token bucket (burst size)
    #[serde(default = "default_bucket_capacity")]
    pub capacity: u64,

    /// Rate at which tokens are refilled (tokens per second)
    #[serde(default = "default_refill_rate")]
    pub refill_rate: f64,
}

fn default_bucket_capacity() -> u64 {
    10
}

fn default_refill_rate() -> f64 {
    3.0
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self {
            capacity: default_bucket_capacity(),
            refill_rate: default_refill_rate(),
        }
    }
}

impl TokenBucketConfig {
    /// Time for an empty bucket to fill back up to capacity
    pub fn full_refill_time(&self) -> Duration {
        Duration::try_from_secs_f64(self.capacity as f64 / self.refill_rate).unwrap_or(Duration::MAX)
    }
}

/// Configuration for reclaiming idle admission buckets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReclamationConfig {
    /// Whether to run a background task that drops idle buckets
    #[serde(default)]
    pub enabled: bool,

    /// Buckets untouched for longer than this are dropped
    #[serde(default = "default_idle_timeout", with = "duration_serde")]
    pub idle_timeout: Duration,

    /// How often the background task runs
    #[serde(default = "default_reclaim_interval", with = "duration_serde")]
    pub interval: Duration,
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_reclaim_interval() -> Duration {
    Duration::from_secs(60)
}

impl Default for ReclamationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            idle_timeout: default_idle_timeout(),
            interval: default_reclaim_interval(),
        }
    }
}

impl ShortenerConfig {
    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from `SHORTENER_*` environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            base_url: std::env::var("SHORTENER_BASE_URL").unwrap_or(defaults.base_url),
            cache: CacheConfig {
                capacity: env_or("SHORTENER_CACHE_CAPACITY", defaults.cache.capacity)?,
            },
            admission: TokenBucketConfig {
                capacity: env_or("SHORTENER_RATE_BURST", defaults.admission.capacity)?,
                refill_rate: env_or("SHORTENER_RATE_REFILL", defaults.admission.refill_rate)?,
            },
            reclamation: ReclamationConfig {
                enabled: env_or("SHORTENER_RECLAIM_ENABLED", defaults.reclamation.enabled)?,
                idle_timeout: Duration::from_secs(env_or(
                    "SHORTENER_RECLAIM_IDLE_SECS",
                    defaults.reclamation.idle_timeout.as_secs(),
                )?),
                interval: Duration::from_secs(env_or(
                    "SHORTENER_RECLAIM_INTERVAL_SECS",
                    defaults.reclamation.interval.as_secs(),
                )?),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(ShortenerError::Config(
                "cache capacity must be at least 1".to_string(),
            ));
        }
        if self.admission.capacity == 0 {
            return Err(ShortenerError::Config(
                "admission capacity must be at least 1".to_string(),
            ));
        }
        if !self.admission.refill_rate.is_finite() || self.admission.refill_rate <= 0.0 {
            return Err(ShortenerError::Config(format!(
                "refill rate must be a positive number, got {}",
                self.admission.refill_rate
            )));
        }
        // A bucket dropped before it could have refilled would hand its client a fresh burst early.
        let full_refill = self.admission.full_refill_time();
        if self.reclamation.enabled && self.reclamation.idle_timeout < full_refill {
            return Err(ShortenerError::Config(format!(
                "idle timeout {:?} is shorter than the full refill time {:?}",
                self.reclamation.idle_timeout, full_refill
            )));
        }
        if self.reclamation.enabled && self.reclamation.interval.is_zero() {
            return Err(ShortenerError::Config(
                "reclamation interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|err| ShortenerError::Config(format!("invalid value for {}: {}", key, err))),
        Err(_) => Ok(default),
    }
}

// Helper module to serialize/deserialize Duration with serde
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
