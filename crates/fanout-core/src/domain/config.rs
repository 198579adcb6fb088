//! Fan-out configuration with validation.
//!
//! Loaded from serde (file) or the process environment; sharding values are
//! kept as raw strings so they pass through exactly the same validation as
//! connection query parameters.

use crate::algorithms::Sharding;
use crate::domain::errors::ShardingError;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Default cap on wanted collections per subscriber.
pub const DEFAULT_MAX_WANTED_COLLECTIONS: usize = 100;

/// Default cap on wanted DIDs per subscriber.
pub const DEFAULT_MAX_WANTED_DIDS: usize = 10_000;

/// Default outbound queue depth per subscriber.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 10_000;

/// Main fan-out configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Per-subscriber limits
    pub subscriber: SubscriberLimits,
    /// Process-wide shard assignment
    pub sharding: ShardingConfig,
}

impl FanoutConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.subscriber.validate()?;
        self.sharding()?;
        Ok(())
    }

    /// Build the validated sharding for this process.
    pub fn sharding(&self) -> Result<Sharding, ConfigError> {
        Ok(Sharding::from_values(
            self.sharding.count.as_deref(),
            self.sharding.index.as_deref(),
        )?)
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FANOUT_SHARDING_COUNT`: total shards (unset = no sharding)
    /// - `FANOUT_SHARDING_INDEX`: shard served by this process
    /// - `FANOUT_SUBSCRIBER_BUFFER`: outbound queue depth (default: 10000)
    /// - `FANOUT_MAX_WANTED_COLLECTIONS`: default 100
    /// - `FANOUT_MAX_WANTED_DIDS`: default 10000
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = SubscriberLimits::default();
        let config = Self {
            subscriber: SubscriberLimits {
                max_wanted_collections: parse_var(
                    &lookup,
                    "FANOUT_MAX_WANTED_COLLECTIONS",
                    defaults.max_wanted_collections,
                )?,
                max_wanted_dids: parse_var(
                    &lookup,
                    "FANOUT_MAX_WANTED_DIDS",
                    defaults.max_wanted_dids,
                )?,
                buffer_size: parse_var(&lookup, "FANOUT_SUBSCRIBER_BUFFER", defaults.buffer_size)?,
            },
            sharding: ShardingConfig {
                count: lookup("FANOUT_SHARDING_COUNT"),
                index: lookup("FANOUT_SHARDING_INDEX"),
            },
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidLimit(format!("{key}: not a number: {raw:?}"))),
        None => Ok(default),
    }
}

/// Per-subscriber limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberLimits {
    /// Max entries in `wantedCollections`
    pub max_wanted_collections: usize,
    /// Max entries in `wantedDids`
    pub max_wanted_dids: usize,
    /// Outbound queue depth before events are dropped for that subscriber
    pub buffer_size: usize,
}

impl SubscriberLimits {
    /// Validate limits; every limit must be non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::InvalidLimit("buffer_size cannot be 0".into()));
        }

        if self.max_wanted_collections == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_wanted_collections cannot be 0".into(),
            ));
        }

        if self.max_wanted_dids == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_wanted_dids cannot be 0".into(),
            ));
        }

        Ok(())
    }
}

impl Default for SubscriberLimits {
    fn default() -> Self {
        Self {
            max_wanted_collections: DEFAULT_MAX_WANTED_COLLECTIONS,
            max_wanted_dids: DEFAULT_MAX_WANTED_DIDS,
            buffer_size: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

/// Raw shard assignment, validated by [`Sharding::from_values`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardingConfig {
    /// `shardingCount`
    pub count: Option<String>,
    /// `shardingIndex`
    pub index: Option<String>,
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid shard assignment
    #[error("invalid sharding: {0}")]
    Sharding(#[from] ShardingError),
}
