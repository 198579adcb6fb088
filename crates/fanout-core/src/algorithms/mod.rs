//! # Algorithms Module
//!
//! Pure decision logic: size parsing, DID sharding and subscriber filtering.

pub mod filter;
pub mod sharder;
pub mod size_parser;

pub use filter::{FilterSnapshot, SubscriberFilter};
pub use sharder::{shard_hash, Sharder, Sharding};
pub use size_parser::{parse_max_message_size_bytes, SizeInput};
