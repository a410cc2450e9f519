//! # a3s-bus
//!
//! Priority-ordered, mutation-aware event dispatch for modular terminal
//! applications.
//!
//! ## Overview
//!
//! UI modules (prompt, output pane, directory tree, status bar, completion
//! list) never hold references to each other. They publish events into a
//! shared [`Bus`] and register handlers on it. Every handler sees every
//! event, in priority order, and may rewrite it for the handlers after it or
//! stop it altogether.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_bus::{Bus, Envelope};
//!
//! let bus: Bus<Envelope<String>> = Bus::new();
//!
//! // Extension: decorate the payload before the base consumer sees it
//! bus.subscribe_with_priority(99, |e: Envelope<String>| {
//!     let tagged = format!("ext/{}", e.payload);
//!     Some(e.with_payload(tagged))
//! });
//!
//! // Base consumer
//! bus.subscribe(|e: Envelope<String>| {
//!     assert_eq!(e.payload, "ext/eagle");
//!     Some(e)
//! });
//!
//! bus.dispatch(Envelope::new("bird", "eagle".to_string()));
//! ```
//!
//! ## Delayed start
//!
//! A bus built with [`Bus::delayed`] (or `delayedStart` in [`BusConfig`])
//! queues every dispatched event until [`Bus::start`] is called, then replays
//! them in publish order through whoever is subscribed at that point.
//!
//! ## Architecture
//!
//! - **Message** trait: the id every event exposes
//! - **Envelope**: generic id + payload event
//! - **AppEvent**: the terminal application's closed event space
//! - **Bus**: subscription bookkeeping, buffering and the delivery chain
//! - **TraceSink**: optional JSON-lines diagnostic log of bus activity

pub mod bus;
pub mod config;
pub mod error;
pub mod events;
pub mod trace;
pub mod types;

// Re-export core types
pub use bus::Bus;
pub use config::{BusConfig, TraceConfig};
pub use error::{BusError, Result};
pub use events::{AppEvent, FocusTarget, LogLevel, OutputStream};
pub use trace::{FileTraceSink, MemoryTraceSink, TraceAction, TraceRecord, TraceSink};
pub use types::{priority, DispatchOutcome, Envelope, Message, SubscriptionId};
