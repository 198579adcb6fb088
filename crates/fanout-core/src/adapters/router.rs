//! Event router: evaluates every event against every subscriber's filter and
//! queues accepted events for that subscriber's connection.
//!
//! Each subscriber gets a bounded queue. A full queue drops the event for that
//! subscriber only; disconnect policy for slow consumers belongs to the
//! transport, which sees the drop counters through [`EventRouter::stats`].

use crate::adapters::control::{decode_control_message, ControlMessage};
use crate::algorithms::{Sharding, SubscriberFilter};
use crate::domain::{
    ConfigError, ControlError, FanoutConfig, QueryParams, RouterError, SinkError, StreamEvent,
    SubscriberId, SubscriberLimits,
};
use crate::ports::{ControlChannel, ControlOutcome, EmitOutcome, EventIngress, EventSink};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

type Registry = DashMap<SubscriberId, SubscriberEntry>;

struct SubscriberEntry {
    filter: Arc<SubscriberFilter>,
    queue: mpsc::Sender<Arc<StreamEvent>>,
}

#[derive(Debug, Default)]
struct RouterCounters {
    events_emitted: AtomicU64,
    deliveries: AtomicU64,
    filtered: AtomicU64,
    drops: AtomicU64,
}

/// Point-in-time router counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    /// Events passed to [`EventRouter::emit`].
    pub events_emitted: u64,
    /// Events queued for a subscriber.
    pub deliveries: u64,
    /// Subscriber/event pairs rejected by a filter.
    pub filtered: u64,
    /// Accepted events lost to a full subscriber queue.
    pub drops: u64,
    /// Currently registered subscribers.
    pub active_subscribers: usize,
}

/// Process-wide fan-out router.
pub struct EventRouter {
    sharding: Sharding,
    limits: SubscriberLimits,
    subscribers: Arc<Registry>,
    counters: RouterCounters,
}

impl EventRouter {
    /// Router for a validated configuration.
    pub fn new(config: &FanoutConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::with_sharding(config.sharding()?, config.subscriber)
    }

    /// Router with explicit sharding and limits.
    ///
    /// Zero limits are rejected: a subscriber queue needs room for at least
    /// one event.
    pub fn with_sharding(
        sharding: Sharding,
        limits: SubscriberLimits,
    ) -> Result<Self, ConfigError> {
        limits.validate()?;
        info!(%sharding, buffer_size = limits.buffer_size, "Event router configured");
        Ok(Self {
            sharding,
            limits,
            subscribers: Arc::new(DashMap::new()),
            counters: RouterCounters::default(),
        })
    }

    /// Sharding applied to every subscriber.
    pub fn sharding(&self) -> Sharding {
        self.sharding
    }

    /// Register a connection from its decoded query parameters.
    pub fn register(&self, params: &QueryParams) -> Result<Subscriber, RouterError> {
        let filter = Arc::new(SubscriberFilter::from_query(
            params,
            self.sharding,
            &self.limits,
        )?);
        let (queue, receiver) = mpsc::channel(self.limits.buffer_size);
        let id = Uuid::new_v4();

        let snapshot = filter.snapshot();
        info!(
            subscriber_id = %id,
            wanted_collections = snapshot.wanted_collections().len(),
            wanted_dids = snapshot.wanted_dids().len(),
            max_message_size_bytes = snapshot.max_message_size_bytes(),
            awaiting_hello = filter.awaiting_hello(),
            "Subscriber registered"
        );

        self.subscribers.insert(
            id,
            SubscriberEntry {
                filter: Arc::clone(&filter),
                queue,
            },
        );

        Ok(Subscriber {
            control: SubscriberControl {
                id,
                filter,
                limits: self.limits,
            },
            receiver,
            registry: Arc::downgrade(&self.subscribers),
        })
    }

    /// Remove a subscriber; its queue closes once drained.
    pub fn unregister(&self, id: &SubscriberId) -> bool {
        let removed = self.subscribers.remove(id).is_some();
        if removed {
            debug!(subscriber_id = %id, "Subscriber unregistered");
        }
        removed
    }

    /// Current counters.
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            events_emitted: self.counters.events_emitted.load(Ordering::Relaxed),
            deliveries: self.counters.deliveries.load(Ordering::Relaxed),
            filtered: self.counters.filtered.load(Ordering::Relaxed),
            drops: self.counters.drops.load(Ordering::Relaxed),
            active_subscribers: self.subscribers.len(),
        }
    }

    /// Route every event of `upstream` until it ends; returns the number routed.
    pub async fn run<S>(&self, mut upstream: S) -> u64
    where
        S: Stream<Item = Arc<StreamEvent>> + Unpin,
    {
        let mut routed = 0u64;
        while let Some(event) = upstream.next().await {
            self.emit(event);
            routed += 1;
        }
        info!(routed, "Upstream ended");
        routed
    }
}

impl EventIngress for EventRouter {
    fn emit(&self, event: Arc<StreamEvent>) -> EmitOutcome {
        self.counters.events_emitted.fetch_add(1, Ordering::Relaxed);

        let mut outcome = EmitOutcome::default();
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            if !entry.filter.accepts(&event) {
                outcome.filtered += 1;
                continue;
            }
            match entry.queue.try_send(Arc::clone(&event)) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    outcome.dropped += 1;
                    debug!(
                        subscriber_id = %entry.key(),
                        did = %event.did,
                        "Subscriber queue full, event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Removal must wait until the iterator has released its shard locks.
        for id in &closed {
            self.subscribers.remove(id);
            debug!(subscriber_id = %id, "Removed disconnected subscriber");
        }
        outcome.disconnected = closed.len();

        self.counters
            .deliveries
            .fetch_add(outcome.delivered as u64, Ordering::Relaxed);
        self.counters
            .filtered
            .fetch_add(outcome.filtered as u64, Ordering::Relaxed);
        self.counters
            .drops
            .fetch_add(outcome.dropped as u64, Ordering::Relaxed);

        outcome
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Cloneable handle for applying a subscriber's control messages.
#[derive(Clone, Debug)]
pub struct SubscriberControl {
    id: SubscriberId,
    filter: Arc<SubscriberFilter>,
    limits: SubscriberLimits,
}

impl SubscriberControl {
    /// Subscriber this handle controls.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Live filter.
    pub fn filter(&self) -> &SubscriberFilter {
        &self.filter
    }
}

impl ControlChannel for SubscriberControl {
    fn handle_control_message(&self, raw: &str) -> Result<ControlOutcome, ControlError> {
        let message = decode_control_message(raw).map_err(|e| {
            warn!(subscriber_id = %self.id, error = %e, "Rejected control message");
            e
        })?;

        match message {
            ControlMessage::OptionsUpdate(payload) => {
                let snapshot = self.filter.apply(payload, &self.limits).map_err(|e| {
                    warn!(subscriber_id = %self.id, error = %e, "Rejected options update");
                    e
                })?;
                info!(
                    subscriber_id = %self.id,
                    wanted_collections = snapshot.wanted_collections().len(),
                    wanted_dids = snapshot.wanted_dids().len(),
                    max_message_size_bytes = snapshot.max_message_size_bytes(),
                    "Subscriber options updated"
                );
                Ok(ControlOutcome::OptionsUpdated)
            }
            ControlMessage::Unknown(message_type) => {
                warn!(
                    subscriber_id = %self.id,
                    message_type = %message_type,
                    "Ignoring unknown control message"
                );
                Ok(ControlOutcome::Ignored(message_type))
            }
        }
    }
}

/// One registered connection: its outbound queue and control handle.
///
/// Dropping the subscriber unregisters it from the router.
pub struct Subscriber {
    control: SubscriberControl,
    receiver: mpsc::Receiver<Arc<StreamEvent>>,
    registry: Weak<Registry>,
}

impl Subscriber {
    /// Router-assigned identifier.
    pub fn id(&self) -> SubscriberId {
        self.control.id
    }

    /// Live filter.
    pub fn filter(&self) -> &SubscriberFilter {
        &self.control.filter
    }

    /// Handle for the connection's inbound reader.
    pub fn control(&self) -> SubscriberControl {
        self.control.clone()
    }

    /// Next queued event; `None` once the router dropped this subscriber.
    pub async fn recv(&mut self) -> Option<Arc<StreamEvent>> {
        self.receiver.recv().await
    }

    /// Drain queued events into `sink` until the queue closes or the sink fails.
    ///
    /// Returns the number of messages sent when the queue closes.
    pub async fn forward_to<S>(&mut self, sink: &S) -> Result<u64, SinkError>
    where
        S: EventSink + ?Sized,
    {
        let mut sent = 0u64;
        while let Some(event) = self.receiver.recv().await {
            if let Err(e) = sink.send(event.encoded().clone()).await {
                debug!(subscriber_id = %self.control.id, error = %e, sent, "Sink failed");
                return Err(e);
            }
            sent += 1;
        }
        Ok(sent)
    }
}

impl ControlChannel for Subscriber {
    fn handle_control_message(&self, raw: &str) -> Result<ControlOutcome, ControlError> {
        self.control.handle_control_message(raw)
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if registry.remove(&self.control.id).is_some() {
            debug!(subscriber_id = %self.control.id, "Subscriber dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventKind;
    use crate::ports::MockEventSink;

    fn commit(did: &str, collection: &str) -> Arc<StreamEvent> {
        Arc::new(
            StreamEvent::new(
                did,
                0,
                EventKind::Commit {
                    collection: collection.to_string(),
                },
                &serde_json::json!({"rkey": "3k"}),
            )
            .unwrap(),
        )
    }

    fn router() -> EventRouter {
        EventRouter::with_sharding(Sharding::Disabled, SubscriberLimits::default()).unwrap()
    }

    #[tokio::test]
    async fn test_emit_to_matching_subscribers() {
        let router = router();
        let mut all = router.register(&QueryParams::new()).unwrap();
        let mut posts = router
            .register(&QueryParams::from_pairs([("wantedCollections", "app.bsky.feed.post")]))
            .unwrap();

        let outcome = router.emit(commit("did:plc:a", "app.bsky.feed.like"));
        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.filtered, 1);

        router.emit(commit("did:plc:a", "app.bsky.feed.post"));

        assert_eq!(all.recv().await.unwrap().collection(), Some("app.bsky.feed.like"));
        assert_eq!(all.recv().await.unwrap().collection(), Some("app.bsky.feed.post"));
        assert_eq!(posts.recv().await.unwrap().collection(), Some("app.bsky.feed.post"));
    }

    #[tokio::test]
    async fn test_full_queue_drops_only_for_that_subscriber() {
        let limits = SubscriberLimits {
            buffer_size: 1,
            ..SubscriberLimits::default()
        };
        let router = EventRouter::with_sharding(Sharding::Disabled, limits).unwrap();
        let _slow = router.register(&QueryParams::new()).unwrap();

        assert_eq!(router.emit(commit("did:plc:a", "a.b.c")).delivered, 1);
        let outcome = router.emit(commit("did:plc:a", "a.b.c"));
        assert_eq!(outcome.dropped, 1);
        assert_eq!(router.stats().drops, 1);
        assert_eq!(router.stats().deliveries, 1);
    }

    #[test]
    fn test_zero_buffer_rejected_at_construction() {
        let limits = SubscriberLimits {
            buffer_size: 0,
            ..SubscriberLimits::default()
        };
        let err = EventRouter::with_sharding(Sharding::Disabled, limits)
            .err()
            .unwrap();
        assert_eq!(
            err,
            ConfigError::InvalidLimit("buffer_size cannot be 0".into())
        );

        let config = FanoutConfig {
            subscriber: limits,
            ..FanoutConfig::default()
        };
        assert!(EventRouter::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_drop_unregisters() {
        let router = router();
        let subscriber = router.register(&QueryParams::new()).unwrap();
        assert_eq!(router.subscriber_count(), 1);
        drop(subscriber);
        assert_eq!(router.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_unregister_closes_queue() {
        let router = router();
        let mut subscriber = router.register(&QueryParams::new()).unwrap();
        router.emit(commit("did:plc:a", "a.b.c"));
        assert!(router.unregister(&subscriber.id()));
        assert!(!router.unregister(&subscriber.id()));

        // Already-queued events are still delivered, then the queue ends.
        assert!(subscriber.recv().await.is_some());
        assert!(subscriber.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_query_rejected() {
        let router = router();
        let result = router.register(&QueryParams::from_pairs([("wantedCollections", "a.*.b")]));
        assert!(matches!(result, Err(RouterError::InvalidOptions(_))));
        assert_eq!(router.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_control_message_updates_filter() {
        let router = router();
        let mut subscriber = router.register(&QueryParams::new()).unwrap();
        let control = subscriber.control();

        let outcome = control
            .handle_control_message(
                r#"{"type":"options_update","payload":{"wantedDids":["did:plc:b"]}}"#,
            )
            .unwrap();
        assert_eq!(outcome, ControlOutcome::OptionsUpdated);

        router.emit(commit("did:plc:a", "a.b.c"));
        router.emit(commit("did:plc:b", "a.b.c"));
        assert_eq!(subscriber.recv().await.unwrap().did, "did:plc:b");
    }

    #[tokio::test]
    async fn test_malformed_control_message_keeps_filter() {
        let router = router();
        let subscriber = router
            .register(&QueryParams::from_pairs([("wantedDids", "did:plc:a")]))
            .unwrap();

        assert!(subscriber.handle_control_message("{oops").is_err());
        let outcome = subscriber.handle_control_message(r#"{"type":"hello"}"#).unwrap();
        assert_eq!(outcome, ControlOutcome::Ignored("hello".to_string()));
        assert!(subscriber.filter().snapshot().wanted_dids().contains("did:plc:a"));
    }

    #[tokio::test]
    async fn test_forward_to_sink() {
        let router = router();
        let mut subscriber = router.register(&QueryParams::new()).unwrap();
        let event = commit("did:plc:a", "a.b.c");
        router.emit(Arc::clone(&event));
        router.emit(commit("did:plc:b", "a.b.c"));
        router.unregister(&subscriber.id());

        let sink = MockEventSink::new();
        assert_eq!(subscriber.forward_to(&sink).await.unwrap(), 2);
        assert_eq!(sink.sent()[0], event.encoded().clone());
    }

    #[tokio::test]
    async fn test_forward_stops_on_sink_failure() {
        let router = router();
        let mut subscriber = router.register(&QueryParams::new()).unwrap();
        router.emit(commit("did:plc:a", "a.b.c"));
        router.emit(commit("did:plc:a", "a.b.c"));

        let sink = MockEventSink::failing_after(1);
        assert_eq!(subscriber.forward_to(&sink).await, Err(SinkError::Closed));
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_closed_receiver_is_removed_on_emit() {
        let router = router();
        let (queue, receiver) = mpsc::channel(1);
        drop(receiver);
        router.subscribers.insert(
            Uuid::new_v4(),
            SubscriberEntry {
                filter: Arc::new(SubscriberFilter::new(Default::default(), Sharding::Disabled)),
                queue,
            },
        );
        let _live = router.register(&QueryParams::new()).unwrap();

        let outcome = router.emit(commit("did:plc:a", "a.b.c"));
        assert_eq!(outcome.disconnected, 1);
        assert_eq!(outcome.delivered, 1);
        assert_eq!(router.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_run_routes_upstream() {
        let router = router();
        let mut subscriber = router.register(&QueryParams::new()).unwrap();
        let upstream = tokio_stream::iter(vec![
            commit("did:plc:a", "a.b.c"),
            commit("did:plc:b", "a.b.c"),
        ]);

        assert_eq!(router.run(upstream).await, 2);
        assert_eq!(router.stats().events_emitted, 2);
        assert_eq!(subscriber.recv().await.unwrap().did, "did:plc:a");
    }

    #[test]
    fn test_new_validates_config() {
        let mut config = FanoutConfig::default();
        config.sharding.count = Some("3".to_string());
        config.sharding.index = Some("0".to_string());
        assert!(EventRouter::new(&config).is_err());

        config.sharding.count = Some("4".to_string());
        let router = EventRouter::new(&config).unwrap();
        assert!(router.sharding().is_enabled());
    }
}
