//! # Adapters Layer (Hexagonal Architecture)
//!
//! Control-frame decoding and the in-process event router.

mod control;
mod router;

pub use control::{decode_control_message, ControlMessage};
pub use router::{EventRouter, RouterStats, Subscriber, SubscriberControl};
