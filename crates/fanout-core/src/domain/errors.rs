//! # Domain Errors
//!
//! Error types for the fan-out core.
//!
//! Sharding messages are part of the wire contract: operators and clients
//! match on the exact text, so the `#[error]` strings must not drift.

use std::num::ParseIntError;
use thiserror::Error;

/// Failure to build a [`Sharder`](crate::Sharder) from numeric parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SharderBuildError {
    /// `count <= 0`.
    #[error("count needs to be positive")]
    NonPositiveCount,

    /// `count` is positive but not a power of two.
    #[error("count needs to be a power of two")]
    CountNotPowerOfTwo,

    /// `index < 0` or `index >= count`.
    #[error("index needs to be in [0, count)")]
    IndexOutOfRange,
}

/// Failure to build sharding from untrusted key/value parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardingError {
    /// `shardingCount` is present but not an integer.
    #[error("shardingCount: {0}")]
    InvalidCount(ParseIntError),

    /// `shardingCount` is present without `shardingIndex`.
    #[error("shardingIndex: must be specified when shardingCount is specified")]
    MissingIndex,

    /// `shardingIndex` is present without `shardingCount`.
    #[error("shardingCount: must be specified when shardingIndex is specified")]
    MissingCount,

    /// `shardingIndex` is present but not an integer.
    #[error("shardingIndex: {0}")]
    InvalidIndex(ParseIntError),

    /// Both values parsed but do not describe a valid partition.
    #[error("error building sharder: {0}")]
    Build(#[from] SharderBuildError),
}

/// Rejected subscriber filter options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// More collections than the subscriber limit allows.
    #[error("too many wanted collections: {got} (max {max})")]
    TooManyCollections {
        /// Collections requested
        got: usize,
        /// Configured maximum
        max: usize,
    },

    /// More DIDs than the subscriber limit allows.
    #[error("too many wanted dids: {got} (max {max})")]
    TooManyDids {
        /// DIDs requested
        got: usize,
        /// Configured maximum
        max: usize,
    },

    /// Empty entry, or a wildcard anywhere but a trailing `.*`.
    #[error("invalid collection filter: {0:?}")]
    InvalidCollection(String),
}

/// Failure while handling a subscriber-sourced control message.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The message is not valid JSON or does not match the envelope/payload shape.
    #[error("malformed control message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload decoded but its options were rejected.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Failure to register a subscriber with the router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// Connection parameters produced an invalid filter.
    #[error("invalid subscriber options: {0}")]
    InvalidOptions(#[from] FilterError),
}

/// Failure reported by the transport when delivering bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The peer went away.
    #[error("connection closed")]
    Closed,

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}
