//! # Fanout Core
//!
//! Subscriber-side filtering for a firehose fan-out broadcaster.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Every connected subscriber declares which events it wants. For each upstream
//! event the router asks every subscriber's filter whether to deliver it:
//! - Collection filter with exact names and trailing `.*` prefixes (commits only)
//! - DID allow-list
//! - Deterministic DID sharding (`shardingCount` / `shardingIndex`)
//! - Maximum serialized message size
//!
//! Subscribers may replace their filter at any time with an `options_update`
//! control frame. Readers always observe either the old or the new filter in
//! full, never a mix.
//!
//! ## Sharding
//!
//! | Parameter | Rule |
//! |-----------|------|
//! | `shardingCount` | positive power of two |
//! | `shardingIndex` | `0 <= index < count` |
//! | hash | xxHash64, seed 0, over the DID bytes |
//!
//! A DID belongs to shard `hash(did) & (count - 1)`, so a fleet of `count`
//! instances with indices `0..count` covers every DID exactly once.
//!
//! ## Module Structure
//!
//! ```text
//! fanout-core/
//! ├── domain/          # Events, query params, config, errors, invariants
//! ├── algorithms/      # Size parser, sharder, subscriber filter
//! ├── ports/           # Ingress/control traits, EventSink
//! └── adapters/        # Control decoding, EventRouter
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{
    decode_control_message, ControlMessage, EventRouter, RouterStats, Subscriber,
    SubscriberControl,
};
pub use algorithms::{
    parse_max_message_size_bytes, shard_hash, FilterSnapshot, Sharder, Sharding, SizeInput,
    SubscriberFilter,
};
pub use domain::{
    invariant_exclusive_cover, invariant_sharder_consistent, invariant_snapshot_within_limits,
    CollectionFilter, ConfigError, ControlError, EventKind, FanoutConfig, FilterError,
    QueryParams, RouterError, SharderBuildError, ShardingConfig, ShardingError, SinkError,
    StreamEvent, SubscriberId, SubscriberLimits, SubscriberOptionsUpdatePayload,
    SubscriberSourcedMessage, DEFAULT_MAX_WANTED_COLLECTIONS, DEFAULT_MAX_WANTED_DIDS,
    DEFAULT_SUBSCRIBER_BUFFER, MAX_MESSAGE_SIZE_PARAM, OPTIONS_UPDATE, REQUIRE_HELLO_PARAM,
    SHARDING_COUNT_PARAM, SHARDING_INDEX_PARAM, WANTED_COLLECTIONS_PARAM, WANTED_DIDS_PARAM,
};
pub use ports::{
    ChannelSink, ControlChannel, ControlOutcome, EmitOutcome, EventIngress, EventSink,
    MockEventSink,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
