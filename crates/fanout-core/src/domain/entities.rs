//! # Domain Entities
//!
//! Events flowing through the router and the identity of a subscriber.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to every registered subscriber.
pub type SubscriberId = Uuid;

/// What happened upstream.
///
/// Only commits carry a collection; identity and account events describe the
/// producer itself and are never subject to collection filtering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// A record was created, updated or deleted in `collection`.
    Commit {
        /// Collection NSID, e.g. `app.bsky.feed.post`.
        collection: String,
    },
    /// The producer's handle or DID document changed.
    Identity,
    /// The producer's account status changed.
    Account,
}

impl EventKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit { .. } => "commit",
            Self::Identity => "identity",
            Self::Account => "account",
        }
    }

    /// Category for collection filtering, if this kind has one.
    pub fn collection(&self) -> Option<&str> {
        match self {
            Self::Commit { collection } => Some(collection),
            Self::Identity | Self::Account => None,
        }
    }
}

/// A decoded upstream event together with its serialized wire form.
///
/// The wire form is produced once and shared by every subscriber; its length
/// is what per-subscriber size caps are compared against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamEvent {
    /// Producer identifier.
    pub did: String,
    /// Upstream timestamp in microseconds.
    pub time_us: i64,
    /// Event kind (and collection for commits).
    pub kind: EventKind,
    encoded: Bytes,
}

#[derive(Serialize)]
struct WireEvent<'a> {
    did: &'a str,
    time_us: i64,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    collection: Option<&'a str>,
    body: &'a serde_json::Value,
}

impl StreamEvent {
    /// Build an event and serialize its wire form.
    pub fn new(
        did: impl Into<String>,
        time_us: i64,
        kind: EventKind,
        body: &serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let did = did.into();
        let encoded = serde_json::to_vec(&WireEvent {
            did: &did,
            time_us,
            kind: kind.as_str(),
            collection: kind.collection(),
            body,
        })?;
        Ok(Self {
            did,
            time_us,
            kind,
            encoded: Bytes::from(encoded),
        })
    }

    /// Wrap an event whose wire form was produced elsewhere.
    pub fn from_encoded(
        did: impl Into<String>,
        time_us: i64,
        kind: EventKind,
        encoded: Bytes,
    ) -> Self {
        Self {
            did: did.into(),
            time_us,
            kind,
            encoded,
        }
    }

    /// Collection of a commit event.
    pub fn collection(&self) -> Option<&str> {
        self.kind.collection()
    }

    /// Serialized wire form.
    pub fn encoded(&self) -> &Bytes {
        &self.encoded
    }

    /// Size of the wire form in bytes.
    pub fn encoded_len(&self) -> usize {
        self.encoded.len()
    }
}
