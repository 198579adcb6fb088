//! # Inbound Ports
//!
//! What the core offers to the upstream consumer and to connection handlers.

use crate::domain::{ControlError, StreamEvent};
use serde::Serialize;
use std::sync::Arc;

/// Per-event routing result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EmitOutcome {
    /// Subscribers whose queue accepted the event.
    pub delivered: usize,
    /// Subscribers whose filter rejected the event.
    pub filtered: usize,
    /// Subscribers that wanted the event but had a full queue.
    pub dropped: usize,
    /// Subscribers found disconnected and removed.
    pub disconnected: usize,
}

/// Effect of one control message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlOutcome {
    /// The filter was replaced.
    OptionsUpdated,
    /// Unknown message type; nothing changed.
    Ignored(String),
}

/// Upstream side: hand every decoded event to the router.
pub trait EventIngress: Send + Sync {
    /// Route one event to every interested subscriber.
    fn emit(&self, event: Arc<StreamEvent>) -> EmitOutcome;

    /// Number of registered subscribers.
    fn subscriber_count(&self) -> usize;
}

/// Connection side: messages a subscriber sends on its own connection.
pub trait ControlChannel: Send + Sync {
    /// Decode and apply one raw text frame.
    ///
    /// Malformed frames are returned as errors and leave the filter unchanged.
    fn handle_control_message(&self, raw: &str) -> Result<ControlOutcome, ControlError>;
}
