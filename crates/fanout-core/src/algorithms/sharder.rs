//! # DID Sharding
//!
//! Power-of-two partition of producer DIDs so that `count` stateless
//! instances, one per `index`, jointly serve the stream with no overlap.
//!
//! The hash is pinned to xxHash64 (seed 0) over the DID's UTF-8 bytes. Every
//! instance of a fleet must agree on it, including instances deployed before
//! this crate existed.

use crate::domain::{
    QueryParams, SharderBuildError, ShardingError, SHARDING_COUNT_PARAM, SHARDING_INDEX_PARAM,
};
use std::fmt;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Shard hash of a producer identifier.
pub fn shard_hash(did: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(did.as_bytes());
    hasher.finish()
}

/// Validated shard descriptor; `mask` is always `count - 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sharder {
    count: u64,
    index: u64,
    mask: u64,
}

impl Sharder {
    /// Validate `(count, index)` and derive the mask.
    pub fn new(count: i64, index: i64) -> Result<Self, SharderBuildError> {
        let count = u64::try_from(count)
            .ok()
            .filter(|c| *c > 0)
            .ok_or(SharderBuildError::NonPositiveCount)?;
        if !count.is_power_of_two() {
            return Err(SharderBuildError::CountNotPowerOfTwo);
        }
        let index = u64::try_from(index)
            .ok()
            .filter(|i| *i < count)
            .ok_or(SharderBuildError::IndexOutOfRange)?;

        Ok(Self {
            count,
            index,
            mask: count - 1,
        })
    }

    /// Total number of shards.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Shard served by this instance.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// `count - 1`.
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Shard that owns `did`.
    pub fn shard_of(&self, did: &str) -> u64 {
        shard_hash(did) & self.mask
    }

    /// Whether `did` belongs to this instance's shard.
    pub fn matches(&self, did: &str) -> bool {
        self.shard_of(did) == self.index
    }
}

/// Optional sharding; `Disabled` accepts every identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Sharding {
    /// No sharding configured: this instance serves every DID.
    #[default]
    Disabled,
    /// This instance serves one shard.
    Enabled(Sharder),
}

impl Sharding {
    /// Build from connection/startup query parameters.
    ///
    /// Absence of both `shardingCount` and `shardingIndex` means
    /// [`Sharding::Disabled`], not an error.
    pub fn from_params(params: &QueryParams) -> Result<Self, ShardingError> {
        Self::from_values(
            params.get(SHARDING_COUNT_PARAM),
            params.get(SHARDING_INDEX_PARAM),
        )
    }

    /// Build from raw optional values, validating in a fixed order:
    /// count syntax, index presence, index syntax, then the partition itself.
    pub fn from_values(count: Option<&str>, index: Option<&str>) -> Result<Self, ShardingError> {
        let (count, index) = match (count, index) {
            (None, None) => return Ok(Self::Disabled),
            (None, Some(_)) => return Err(ShardingError::MissingCount),
            (Some(count), index) => {
                let count = count.parse::<i64>().map_err(ShardingError::InvalidCount)?;
                let index = index
                    .ok_or(ShardingError::MissingIndex)?
                    .parse::<i64>()
                    .map_err(ShardingError::InvalidIndex)?;
                (count, index)
            }
        };

        Ok(Self::Enabled(Sharder::new(count, index)?))
    }

    /// Whether this instance should deliver events from `did`.
    pub fn matches(&self, did: &str) -> bool {
        match self {
            Self::Disabled => true,
            Self::Enabled(sharder) => sharder.matches(did),
        }
    }

    /// The configured sharder, if any.
    pub fn sharder(&self) -> Option<&Sharder> {
        match self {
            Self::Disabled => None,
            Self::Enabled(sharder) => Some(sharder),
        }
    }

    /// Whether a shard is configured.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }
}

impl From<Sharder> for Sharding {
    fn from(sharder: Sharder) -> Self {
        Self::Enabled(sharder)
    }
}

impl fmt::Display for Sharding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Enabled(s) => write!(f, "shard {} of {}", s.index, s.count),
        }
    }
}
