//! Priority-ordered, mutation-aware dispatch bus
//!
//! `Bus` owns the subscriber list and the pending buffer. Every dispatched
//! event walks the sorted subscriber list; each handler receives the event
//! returned by the previous one and may pass it on, replace it, or return
//! `None` to stop the chain.
//!
//! ## Locking
//!
//! - `state` guards subscriptions, the pending queue and lifecycle flags. It
//!   is held only for bookkeeping, never while a handler runs, so handlers
//!   may subscribe or dispatch themselves.
//! - `chain` is a re-entrant lock held for a whole delivery chain. Concurrent
//!   dispatches from different threads run one chain at a time; a handler
//!   dispatching on its own thread re-enters without deadlock.

use crate::config::BusConfig;
use crate::error::Result;
use crate::trace::{FileTraceSink, TraceAction, TraceRecord, TraceSink};
use crate::types::{priority, DispatchOutcome, Message, SubscriptionId};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;

type Handler<E> = dyn Fn(E) -> Option<E> + Send + Sync;

struct Subscription<E> {
    id: SubscriptionId,
    priority: i32,
    /// Registration sequence, breaks ties between equal priorities
    order: u64,
    handler: Arc<Handler<E>>,
}

impl<E> Clone for Subscription<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            priority: self.priority,
            order: self.order,
            handler: Arc::clone(&self.handler),
        }
    }
}

struct State<E> {
    /// Sorted by (priority desc, order asc)
    subscriptions: Vec<Subscription<E>>,
    pending: VecDeque<E>,
    started: bool,
    closed: bool,
    next_order: u64,
}

/// Event dispatch bus
///
/// Construct one per application and pass it (usually as `Arc<Bus<E>>`) to
/// every module that publishes or subscribes.
///
/// Delivery chains are serialized across threads: a dispatch from another
/// thread waits until the chain in flight has finished. A handler must not
/// block on another thread that dispatches into the same bus, or both wait
/// forever. Dispatching from the handler's own thread is fine.
pub struct Bus<E: Message> {
    state: Mutex<State<E>>,
    chain: ReentrantMutex<()>,
    sink: RwLock<Option<Arc<dyn TraceSink>>>,
    config: BusConfig,
}

impl<E: Message> Bus<E> {
    /// Create a started bus with default configuration
    pub fn new() -> Self {
        Self::build(BusConfig::default(), None)
    }

    /// Create a bus that buffers events until [`start`](Self::start)
    pub fn delayed() -> Self {
        Self::build(BusConfig::delayed(), None)
    }

    /// Create a bus from configuration, opening the trace file if configured
    pub fn with_config(config: BusConfig) -> Result<Self> {
        let sink = match &config.trace {
            Some(trace) => {
                Some(Arc::new(FileTraceSink::from_config(trace)?) as Arc<dyn TraceSink>)
            }
            None => None,
        };
        Ok(Self::build(config, sink))
    }

    /// Create a bus that traces into the given sink
    ///
    /// `config.trace` is ignored.
    pub fn with_sink(config: BusConfig, sink: Arc<dyn TraceSink>) -> Self {
        Self::build(config, Some(sink))
    }

    fn build(config: BusConfig, sink: Option<Arc<dyn TraceSink>>) -> Self {
        Self {
            state: Mutex::new(State {
                subscriptions: Vec::new(),
                pending: VecDeque::new(),
                started: !config.delayed_start,
                closed: false,
                next_order: 0,
            }),
            chain: ReentrantMutex::new(()),
            sink: RwLock::new(sink),
            config,
        }
    }

    /// Subscribe with the neutral priority
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(E) -> Option<E> + Send + Sync + 'static,
    {
        self.subscribe_with_priority(priority::DEFAULT, handler)
    }

    /// Subscribe a handler at `priority` (higher runs earlier)
    ///
    /// Handlers with equal priority run in registration order.
    pub fn subscribe_with_priority<F>(&self, priority: i32, handler: F) -> SubscriptionId
    where
        F: Fn(E) -> Option<E> + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        let subscribers = {
            let mut state = self.state.lock();
            let order = state.next_order;
            state.next_order += 1;
            state.subscriptions.push(Subscription {
                id,
                priority,
                order,
                handler: Arc::new(handler),
            });
            state
                .subscriptions
                .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.order.cmp(&b.order)));
            state.subscriptions.len()
        };

        tracing::debug!(subscription = %id, priority, subscribers, "Subscribed");
        if let Some(sink) = self.sink() {
            record(
                sink.as_ref(),
                TraceRecord::new(TraceAction::Subscribe).subscription(id, priority),
            );
        }
        id
    }

    /// Subscribe a handler that only sees events whose id is `event_id`
    ///
    /// Other events pass through untouched.
    pub fn subscribe_for<F>(
        &self,
        event_id: impl Into<String>,
        priority: i32,
        handler: F,
    ) -> SubscriptionId
    where
        F: Fn(E) -> Option<E> + Send + Sync + 'static,
    {
        let event_id = event_id.into();
        self.subscribe_with_priority(priority, move |event: E| {
            if event.id() == event_id {
                handler(event)
            } else {
                Some(event)
            }
        })
    }

    /// Remove a subscription
    ///
    /// Returns true if the subscription was found. Chains already in flight
    /// keep the handler until they finish.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let before = state.subscriptions.len();
            state.subscriptions.retain(|s| s.id != id);
            (before != state.subscriptions.len()).then_some(state.subscriptions.len())
        };

        match removed {
            Some(subscribers) => {
                tracing::debug!(subscription = %id, subscribers, "Unsubscribed");
                if let Some(sink) = self.sink() {
                    record(
                        sink.as_ref(),
                        TraceRecord::new(TraceAction::Unsubscribe).detail(id.to_string()),
                    );
                }
                true
            }
            None => false,
        }
    }

    /// Publish an event
    ///
    /// Before start the event is queued. After start the delivery chain runs
    /// synchronously on the calling thread.
    pub fn dispatch(&self, event: E) -> DispatchOutcome {
        let _chain = self.chain.lock();
        let sink = self.sink();

        let snapshot = {
            let mut state = self.state.lock();
            if state.closed {
                drop(state);
                tracing::warn!(event = event.id(), "Dispatch after close, event dropped");
                return DispatchOutcome::Closed;
            }

            if !state.started {
                let buffered = sink
                    .as_ref()
                    .map(|_| TraceRecord::new(TraceAction::Buffer).event(event.id()));
                let max = self.config.max_pending;
                let overflow = if max > 0 && state.pending.len() >= max {
                    state.pending.pop_front()
                } else {
                    None
                };
                state.pending.push_back(event);
                let pending = state.pending.len();
                drop(state);

                if let Some(dropped) = overflow {
                    tracing::warn!(
                        dropped = dropped.id(),
                        max_pending = max,
                        "Pending queue full, oldest buffered event dropped"
                    );
                }
                tracing::trace!(pending, "Event buffered");
                if let (Some(sink), Some(rec)) = (&sink, buffered) {
                    record(sink.as_ref(), rec);
                }
                return DispatchOutcome::Buffered;
            }

            state.subscriptions.clone()
        };

        deliver(event, &snapshot, sink.as_deref())
    }

    /// Start delivery and replay buffered events in publish order
    ///
    /// Idempotent. Returns the number of replayed events (0 when already
    /// started). Buffered events go through the subscriber list as it is now,
    /// so modules that registered after an event was buffered still see it.
    pub fn start(&self) -> usize {
        let _chain = self.chain.lock();
        let pending = {
            let mut state = self.state.lock();
            if state.started || state.closed {
                return 0;
            }
            state.started = true;
            std::mem::take(&mut state.pending)
        };

        let replayed = pending.len();
        tracing::info!(replayed, "Bus started");
        if let Some(sink) = self.sink() {
            record(
                sink.as_ref(),
                TraceRecord::new(TraceAction::Start).detail(format!("replayed {}", replayed)),
            );
        }

        for event in pending {
            self.dispatch(event);
        }
        replayed
    }

    /// Close the bus and release its resources
    ///
    /// Waits for the chain in flight, drops any still-buffered events and all
    /// subscriptions, and flushes the sink. Later dispatches return
    /// [`DispatchOutcome::Closed`]. Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        let _chain = self.chain.lock();
        let (pending, subscriptions) = {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            (
                std::mem::take(&mut state.pending),
                std::mem::take(&mut state.subscriptions),
            )
        };
        // Handler captures are dropped outside the state lock
        let dropped = pending.len();
        drop(pending);
        drop(subscriptions);

        if dropped > 0 {
            tracing::warn!(dropped, "Bus closed before start, buffered events dropped");
        }
        tracing::info!("Bus closed");

        let sink = self.sink.write().take();
        if let Some(sink) = sink {
            record(sink.as_ref(), TraceRecord::new(TraceAction::Close));
            sink.flush()?;
        }
        Ok(())
    }

    /// Whether buffered events have been released
    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    /// Whether `close()` has been called
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of registered subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Number of events waiting for `start()`
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Configuration the bus was built with
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    fn sink(&self) -> Option<Arc<dyn TraceSink>> {
        self.sink.read().clone()
    }
}

/// Run one delivery chain over a subscription snapshot
fn deliver<E: Message>(
    event: E,
    subscriptions: &[Subscription<E>],
    sink: Option<&dyn TraceSink>,
) -> DispatchOutcome {
    if let Some(sink) = sink {
        record(sink, TraceRecord::new(TraceAction::Dispatch).event(event.id()));
    }

    let mut current = event;
    for (index, sub) in subscriptions.iter().enumerate() {
        tracing::trace!(
            event = current.id(),
            subscription = %sub.id,
            priority = sub.priority,
            "Delivering event"
        );
        let event_id = sink.map(|sink| {
            let id = current.id().to_owned();
            record(
                sink,
                TraceRecord::new(TraceAction::Consume)
                    .event(id.as_str())
                    .subscription(sub.id, sub.priority),
            );
            id
        });

        match (sub.handler)(current) {
            Some(next) => current = next,
            None => {
                tracing::trace!(subscription = %sub.id, "Chain short-circuited");
                if let (Some(sink), Some(id)) = (sink, event_id) {
                    record(
                        sink,
                        TraceRecord::new(TraceAction::ShortCircuit)
                            .event(id)
                            .subscription(sub.id, sub.priority),
                    );
                }
                return DispatchOutcome::ShortCircuited {
                    handlers: index + 1,
                    by: sub.id,
                };
            }
        }
    }

    DispatchOutcome::Completed {
        handlers: subscriptions.len(),
    }
}

fn record(sink: &dyn TraceSink, rec: TraceRecord) {
    if let Err(e) = sink.record(&rec) {
        tracing::warn!(action = ?rec.action, error = %e, "Failed to write trace record");
    }
}

impl<E: Message> Default for Bus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Message> std::fmt::Debug for Bus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Bus")
            .field("subscribers", &state.subscriptions.len())
            .field("pending", &state.pending.len())
            .field("started", &state.started)
            .field("closed", &state.closed)
            .field("config", &self.config)
            .finish()
    }
}
