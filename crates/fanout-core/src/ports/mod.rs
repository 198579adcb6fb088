//! # Ports Module
//!
//! Inbound (API) and outbound (transport) traits.

pub mod inbound;
pub mod outbound;

pub use inbound::{ControlChannel, ControlOutcome, EmitOutcome, EventIngress};
pub use outbound::{ChannelSink, EventSink, MockEventSink};
