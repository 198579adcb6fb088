//! # Subscriber Filter
//!
//! Per-connection delivery rules. The wanted collections, wanted DIDs and
//! size cap live together in one immutable [`FilterSnapshot`]; an options
//! update builds a fresh snapshot and swaps it in with a single atomic store,
//! so the routing path never observes old collections paired with a new cap.

use super::sharder::Sharding;
use super::size_parser::parse_max_message_size_bytes;
use crate::domain::{
    CollectionFilter, FilterError, QueryParams, StreamEvent, SubscriberLimits,
    SubscriberOptionsUpdatePayload, MAX_MESSAGE_SIZE_PARAM, REQUIRE_HELLO_PARAM,
    WANTED_COLLECTIONS_PARAM, WANTED_DIDS_PARAM,
};
use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Immutable set of delivery rules.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterSnapshot {
    wanted_collections: CollectionFilter,
    wanted_dids: HashSet<String>,
    max_message_size_bytes: u32,
}

impl FilterSnapshot {
    /// Validate raw options against `limits` and build a snapshot.
    pub fn build<C, D>(
        wanted_collections: C,
        wanted_dids: D,
        max_message_size_bytes: u32,
        limits: &SubscriberLimits,
    ) -> Result<Self, FilterError>
    where
        C: IntoIterator,
        C::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        let wanted_collections = CollectionFilter::from_entries(wanted_collections)?;
        if wanted_collections.len() > limits.max_wanted_collections {
            return Err(FilterError::TooManyCollections {
                got: wanted_collections.len(),
                max: limits.max_wanted_collections,
            });
        }

        let wanted_dids: HashSet<String> = wanted_dids.into_iter().map(Into::into).collect();
        if wanted_dids.len() > limits.max_wanted_dids {
            return Err(FilterError::TooManyDids {
                got: wanted_dids.len(),
                max: limits.max_wanted_dids,
            });
        }

        Ok(Self {
            wanted_collections,
            wanted_dids,
            max_message_size_bytes,
        })
    }

    /// Snapshot described by an options-update payload (full replacement).
    pub fn from_update(
        payload: SubscriberOptionsUpdatePayload,
        limits: &SubscriberLimits,
    ) -> Result<Self, FilterError> {
        Self::build(
            payload.wanted_collections,
            payload.wanted_dids,
            parse_max_message_size_bytes(payload.max_message_size_bytes),
            limits,
        )
    }

    /// Snapshot described by connection query parameters.
    pub fn from_query(
        params: &QueryParams,
        limits: &SubscriberLimits,
    ) -> Result<Self, FilterError> {
        Self::build(
            params.get_all(WANTED_COLLECTIONS_PARAM).iter().cloned(),
            params.get_all(WANTED_DIDS_PARAM).iter().cloned(),
            params
                .get(MAX_MESSAGE_SIZE_PARAM)
                .map(parse_max_message_size_bytes)
                .unwrap_or(0),
            limits,
        )
    }

    /// Wanted collections; empty = all.
    pub fn wanted_collections(&self) -> &CollectionFilter {
        &self.wanted_collections
    }

    /// Wanted DIDs; empty = all.
    pub fn wanted_dids(&self) -> &HashSet<String> {
        &self.wanted_dids
    }

    /// Byte cap; `0` = none.
    pub fn max_message_size_bytes(&self) -> u32 {
        self.max_message_size_bytes
    }

    /// Evaluate the rules, cheapest first: collection, DID, shard, size.
    pub fn accepts(&self, event: &StreamEvent, sharding: &Sharding) -> bool {
        if let Some(collection) = event.collection() {
            if !self.wanted_collections.is_empty() && !self.wanted_collections.matches(collection) {
                return false;
            }
        }

        if !self.wanted_dids.is_empty() && !self.wanted_dids.contains(&event.did) {
            return false;
        }

        if !sharding.matches(&event.did) {
            return false;
        }

        self.max_message_size_bytes == 0
            || event.encoded_len() <= self.max_message_size_bytes as usize
    }
}

/// Live filter of one subscriber, shared by its control reader and the router.
#[derive(Debug)]
pub struct SubscriberFilter {
    snapshot: ArcSwap<FilterSnapshot>,
    sharding: Sharding,
    require_hello: bool,
    hello_received: AtomicBool,
}

impl SubscriberFilter {
    /// Filter starting from `initial`.
    pub fn new(initial: FilterSnapshot, sharding: Sharding) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(initial),
            sharding,
            require_hello: false,
            hello_received: AtomicBool::new(false),
        }
    }

    /// Filter from connection query parameters, honouring `requireHello`.
    pub fn from_query(
        params: &QueryParams,
        sharding: Sharding,
        limits: &SubscriberLimits,
    ) -> Result<Self, FilterError> {
        let require_hello = params
            .get(REQUIRE_HELLO_PARAM)
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");
        Ok(Self::new(FilterSnapshot::from_query(params, limits)?, sharding)
            .with_require_hello(require_hello))
    }

    /// Reject everything until the first options update is applied.
    pub fn with_require_hello(mut self, require_hello: bool) -> Self {
        self.require_hello = require_hello;
        self
    }

    /// Replace the whole filter with `payload`.
    ///
    /// On error the previous snapshot stays in place untouched.
    pub fn apply(
        &self,
        payload: SubscriberOptionsUpdatePayload,
        limits: &SubscriberLimits,
    ) -> Result<Arc<FilterSnapshot>, FilterError> {
        let next = Arc::new(FilterSnapshot::from_update(payload, limits)?);
        self.snapshot.store(Arc::clone(&next));
        self.hello_received.store(true, Ordering::Release);
        Ok(next)
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<FilterSnapshot> {
        self.snapshot.load_full()
    }

    /// Process sharding this filter consults.
    pub fn sharding(&self) -> Sharding {
        self.sharding
    }

    /// Whether events are being held back waiting for the first update.
    pub fn awaiting_hello(&self) -> bool {
        self.require_hello && !self.hello_received.load(Ordering::Acquire)
    }

    /// Whether `event` should be delivered to this subscriber.
    pub fn accepts(&self, event: &StreamEvent) -> bool {
        if self.awaiting_hello() {
            return false;
        }
        self.snapshot.load().accepts(event, &self.sharding)
    }
}
