//! # Outbound Ports
//!
//! What the core needs from the transport: a way to push bytes to one
//! connected subscriber.

use crate::domain::SinkError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Delivery primitive of one connection: send the bytes or fail.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Send one serialized event.
    async fn send(&self, message: Bytes) -> Result<(), SinkError>;
}

/// Sink backed by an unbounded channel, for transports that run their own writer task.
#[derive(Clone, Debug)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Bytes>,
}

impl ChannelSink {
    /// Create a sink and the receiver the writer task drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn send(&self, message: Bytes) -> Result<(), SinkError> {
        self.sender.send(message).map_err(|_| SinkError::Closed)
    }
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Mock sink recording every message.
#[derive(Clone, Debug, Default)]
pub struct MockEventSink {
    sent: Arc<Mutex<Vec<Bytes>>>,
    /// Fail with [`SinkError::Closed`] once this many messages were accepted.
    pub fail_after: Option<usize>,
}

impl MockEventSink {
    /// Sink that never fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that closes after `count` messages.
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::default()
        }
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl EventSink for MockEventSink {
    async fn send(&self, message: Bytes) -> Result<(), SinkError> {
        let mut sent = self.sent.lock();
        if self.fail_after.is_some_and(|limit| sent.len() >= limit) {
            return Err(SinkError::Closed);
        }
        sent.push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_sink_records() {
        let sink = MockEventSink::new();
        sink.send(Bytes::from_static(b"a")).await.unwrap();
        sink.send(Bytes::from_static(b"b")).await.unwrap();
        assert_eq!(sink.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_sink_fails_after_limit() {
        let sink = MockEventSink::failing_after(1);
        assert!(sink.send(Bytes::from_static(b"a")).await.is_ok());
        assert_eq!(
            sink.send(Bytes::from_static(b"b")).await,
            Err(SinkError::Closed)
        );
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (sink, receiver) = ChannelSink::new();
        drop(receiver);
        assert_eq!(sink.send(Bytes::new()).await, Err(SinkError::Closed));
    }
}
