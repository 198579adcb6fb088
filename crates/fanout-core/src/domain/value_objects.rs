//! # Domain Value Objects
//!
//! Immutable values exchanged with the transport: connection query
//! parameters, control-message envelopes and collection filters.

use super::errors::FilterError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};

/// `type` of the control message that replaces a subscriber's filter.
pub const OPTIONS_UPDATE: &str = "options_update";

/// Query parameter: total number of shards.
pub const SHARDING_COUNT_PARAM: &str = "shardingCount";
/// Query parameter: shard served by this instance.
pub const SHARDING_INDEX_PARAM: &str = "shardingIndex";
/// Query parameter (repeatable): wanted collection.
pub const WANTED_COLLECTIONS_PARAM: &str = "wantedCollections";
/// Query parameter (repeatable): wanted producer DID.
pub const WANTED_DIDS_PARAM: &str = "wantedDids";
/// Query parameter: per-message byte cap.
pub const MAX_MESSAGE_SIZE_PARAM: &str = "maxMessageSizeBytes";
/// Query parameter: hold events until the first options update.
pub const REQUIRE_HELLO_PARAM: &str = "requireHello";

/// Multi-valued key/value parameters decoded from a connection URL.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: HashMap<String, Vec<String>>,
}

impl QueryParams {
    /// Empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect parameters from decoded `(key, value)` pairs, keeping order per key.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.append(key, value);
        }
        params
    }

    /// Add one value for `key`.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    /// Whether `key` was supplied at all (even with an empty value).
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value for `key`, in the order supplied.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Envelope of every message a subscriber sends on its connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriberSourcedMessage {
    /// Message discriminator, e.g. [`OPTIONS_UPDATE`].
    #[serde(rename = "type")]
    pub message_type: String,
    /// Type-specific body, decoded once the type is known.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Body of an [`OPTIONS_UPDATE`] message.
///
/// The payload is a full replacement: omitted (or `null`) fields decode to
/// empty / zero and clear the corresponding restriction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberOptionsUpdatePayload {
    /// Collections (or `prefix.*` patterns) to receive; empty = all.
    #[serde(default, deserialize_with = "null_as_default")]
    pub wanted_collections: Vec<String>,
    /// Producer DIDs to receive; empty = all.
    #[serde(default, deserialize_with = "null_as_default")]
    pub wanted_dids: Vec<String>,
    /// Byte cap per message; `0` or any out-of-range value = no cap.
    #[serde(default, deserialize_with = "null_as_default")]
    pub max_message_size_bytes: i64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Set of wanted collections: exact NSIDs plus `prefix.*` patterns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectionFilter {
    exact: HashSet<String>,
    /// Stored with the trailing `.` so `app.bsky.graph.*` never matches `app.bsky.graphx`.
    prefixes: Vec<String>,
}

impl CollectionFilter {
    /// Parse filter entries; rejects empty entries and misplaced wildcards.
    pub fn from_entries<I>(entries: I) -> Result<Self, FilterError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut filter = Self::default();
        for entry in entries {
            let entry: String = entry.into();
            match entry.strip_suffix('*').map(str::to_owned) {
                Some(prefix)
                    if prefix.len() > 1 && prefix.ends_with('.') && !prefix.contains('*') =>
                {
                    if !filter.prefixes.contains(&prefix) {
                        filter.prefixes.push(prefix);
                    }
                }
                None if !entry.is_empty() && !entry.contains('*') => {
                    filter.exact.insert(entry);
                }
                _ => return Err(FilterError::InvalidCollection(entry)),
            }
        }
        Ok(filter)
    }

    /// No restriction configured.
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.prefixes.is_empty()
    }

    /// Number of distinct entries.
    pub fn len(&self) -> usize {
        self.exact.len() + self.prefixes.len()
    }

    /// Whether `collection` is wanted by an exact entry or a prefix pattern.
    pub fn matches(&self, collection: &str) -> bool {
        self.exact.contains(collection) || self.prefixes.iter().any(|p| collection.starts_with(p))
    }
}
