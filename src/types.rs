//! Core types for the a3s-bus dispatch chain
//!
//! The bus is generic over any [`Message`]. [`Envelope`] is the ready-made
//! id + payload message for callers that do not define their own event enum.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A unit of communication routed through the bus
///
/// `id` names the semantic category of the event (e.g. `"work_dir_change"`).
/// It is not unique per instance and is never used for routing: every
/// subscriber sees every event and filters on `id` itself.
pub trait Message: Send + 'static {
    /// Semantic category of this event
    fn id(&self) -> &str;
}

/// Generic event envelope: an identifier plus an owned payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<P> {
    /// Semantic category (e.g., "bird", "output_message")
    pub id: String,

    /// Event payload
    pub payload: P,
}

impl<P> Envelope<P> {
    /// Create a new envelope
    pub fn new(id: impl Into<String>, payload: P) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    /// Replace the payload, keeping the id
    pub fn with_payload(self, payload: P) -> Self {
        Self {
            id: self.id,
            payload,
        }
    }

    /// Build a replacement event by transforming the payload
    pub fn map_payload<Q>(self, f: impl FnOnce(P) -> Q) -> Envelope<Q> {
        Envelope {
            id: self.id,
            payload: f(self.payload),
        }
    }
}

impl<P: Send + 'static> Message for Envelope<P> {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Well-known subscription priorities
///
/// Higher values run earlier. Equal priorities run in registration order.
pub mod priority {
    /// Neutral priority used when none is given
    pub const DEFAULT: i32 = 0;

    /// Rank for extensions that rewrite events before base consumers
    pub const EXTENSION: i32 = 1000;

    /// Observers that must see every event before anything rewrites it
    pub const MONITOR: i32 = i32::MAX;
}

/// Handle identifying a registered subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = self.0.simple().to_string();
        write!(f, "sub-{}", &full[..8])
    }
}

/// What happened to a single dispatched event
///
/// Distinguishes "nobody acted on it" from "a handler stopped it", which the
/// plain return-nothing contract alone cannot express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Queued because the bus has not started yet
    Buffered,

    /// Every subscriber ran; `handlers == 0` means nobody was subscribed
    Completed { handlers: usize },

    /// Subscription `by` returned `None` after `handlers` invocations
    /// (including its own)
    ShortCircuited { handlers: usize, by: SubscriptionId },

    /// The bus was closed; the event was dropped
    Closed,
}

impl DispatchOutcome {
    /// True if the event was queued for later replay
    pub fn is_buffered(&self) -> bool {
        matches!(self, DispatchOutcome::Buffered)
    }

    /// True if a handler stopped propagation
    pub fn is_short_circuited(&self) -> bool {
        matches!(self, DispatchOutcome::ShortCircuited { .. })
    }

    /// True if at least one handler observed the event
    pub fn was_delivered(&self) -> bool {
        self.handlers() > 0
    }

    /// Number of handlers invoked for this dispatch
    pub fn handlers(&self) -> usize {
        match self {
            DispatchOutcome::Completed { handlers }
            | DispatchOutcome::ShortCircuited { handlers, .. } => *handlers,
            DispatchOutcome::Buffered | DispatchOutcome::Closed => 0,
        }
    }
}
