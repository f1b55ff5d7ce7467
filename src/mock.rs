//! # Mock Actors
//!
//! Utilities for testing actors and graphs without real producers or sinks.
//!
//! - [`MockSource`] injects events into the graph through a [`SourceHandle`].
//! - [`MockSink`] records what reaches it and checks it against fluent
//!   expectations, in order.
//!
//! # Example
//! ```ignore
//! let (source, input) = MockSource::new();
//! let sink = MockSink::new();
//! sink.expect_event().of_kind(EventKind::Json).from("enrich").once();
//!
//! let source = director.register_actor("source", source)?;
//! let enrich = director.register_actor("enrich", Enrich)?;
//! let out = director.register_actor("sink", sink.clone())?;
//! director.connect_queue(&source, &enrich)?;
//! director.connect_queue(&enrich, &out)?;
//! director.start().await?;
//!
//! input.send(Event::new(EventKind::Json)).await?;
//! assert!(sink.wait(Duration::from_secs(1)).await);
//! sink.verify(); // Ensures all expectations were met
//! ```

use crate::actor::{Actor, ActorContext};
use crate::error::{FlowError, FlowResult};
use crate::event::{Event, EventKind, Payload};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

// =============================================================================
// SOURCE
// =============================================================================

/// An actor with no inbound queues that forwards whatever its handle sends.
pub struct MockSource {
    receiver: Mutex<Option<mpsc::Receiver<Event>>>,
}

/// Test-side half of a [`MockSource`].
#[derive(Clone)]
pub struct SourceHandle {
    sender: mpsc::Sender<Event>,
}

impl MockSource {
    pub fn new() -> (Self, SourceHandle) {
        let (sender, receiver) = mpsc::channel(100);
        let source = Self {
            receiver: Mutex::new(Some(receiver)),
        };
        (source, SourceHandle { sender })
    }
}

impl SourceHandle {
    /// Hands an event to the source, which sends it to every outbound queue.
    pub async fn send(&self, event: Event) -> FlowResult<()> {
        self.sender
            .send(event)
            .await
            .map_err(|_| FlowError::QueueClosed("mock source is not running".into()))
    }
}

#[async_trait]
impl Actor for MockSource {
    async fn pre_hook(&self, ctx: &ActorContext) -> FlowResult<()> {
        let mut receiver = self
            .receiver
            .lock()
            .take()
            .ok_or_else(|| FlowError::ActorInitFailure("mock source already started".into()))?;
        let forwarder = ctx.clone();
        ctx.spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = forwarder.cancelled() => break,
                    event = receiver.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                if let Err(e) = forwarder.send_event(event).await {
                    forwarder.logger().error(&format!("Mock source failed to send: {e}"), None);
                }
            }
        });
        Ok(())
    }

    async fn consume(&self, _ctx: &ActorContext, _event: Event, _origin: &str) -> FlowResult<()> {
        Ok(())
    }
}

// =============================================================================
// SINK & EXPECTATION BUILDER API
// =============================================================================

/// One expected event. Unset fields match anything.
#[derive(Debug, Clone, Default)]
struct Expectation {
    kind: Option<EventKind>,
    origin: Option<String>,
    data: Option<Payload>,
    faulted: Option<bool>,
}

impl Expectation {
    fn check(&self, event: &Event, origin: &str) -> Result<(), String> {
        if let Some(kind) = self.kind {
            if event.kind() != kind {
                return Err(format!("expected kind {kind}, got {}", event.kind()));
            }
        }
        if let Some(expected) = &self.origin {
            if expected != origin {
                return Err(format!("expected origin '{expected}', got '{origin}'"));
            }
        }
        if let Some(data) = &self.data {
            if event.data() != data {
                return Err(format!("expected data {data}, got {}", event.data()));
            }
        }
        if let Some(faulted) = self.faulted {
            if event.error().is_some() != faulted {
                return Err(format!("expected faulted={faulted}, got {:?}", event.error()));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct SinkState {
    received: Vec<(String, Event)>,
    expectations: VecDeque<Expectation>,
    expected_total: usize,
    failures: Vec<String>,
}

/// A terminal actor that records every event it consumes.
pub struct MockSink {
    state: Mutex<SinkState>,
    count: watch::Sender<usize>,
}

impl MockSink {
    /// Creates a sink with no expectations. Register a clone of the `Arc`.
    pub fn new() -> Arc<Self> {
        let (count, _) = watch::channel(0);
        Arc::new(Self {
            state: Mutex::new(SinkState::default()),
            count,
        })
    }

    /// Starts describing the next expected event.
    pub fn expect_event(&self) -> EventExpectationBuilder<'_> {
        EventExpectationBuilder {
            sink: self,
            expectation: Expectation::default(),
        }
    }

    /// Events received so far, in arrival order.
    pub fn events(&self) -> Vec<Event> {
        self.state.lock().received.iter().map(|(_, e)| e.clone()).collect()
    }

    /// Inbound queue names the received events arrived on.
    pub fn origins(&self) -> Vec<String> {
        self.state.lock().received.iter().map(|(o, _)| o.clone()).collect()
    }

    pub fn received(&self) -> usize {
        *self.count.borrow()
    }

    /// Waits until at least `n` events have arrived. Returns false on timeout.
    pub async fn wait_for(&self, n: usize, timeout: Duration) -> bool {
        let mut count = self.count.subscribe();
        let reached = matches!(
            tokio::time::timeout(timeout, count.wait_for(|received| *received >= n)).await,
            Ok(Ok(_))
        );
        reached
    }

    /// Waits until every registered expectation has been consumed.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let expected = self.state.lock().expected_total;
        self.wait_for(expected, timeout).await
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let state = self.state.lock();
        if !state.failures.is_empty() {
            panic!("Unexpected events: {}", state.failures.join("; "));
        }
        if !state.expectations.is_empty() {
            panic!(
                "Not all expectations were met. {} remaining",
                state.expectations.len()
            );
        }
    }

    fn push(&self, expectation: Expectation, times: usize) {
        let mut state = self.state.lock();
        state.expected_total += times;
        for _ in 0..times {
            state.expectations.push_back(expectation.clone());
        }
    }
}

#[async_trait]
impl Actor for MockSink {
    async fn consume(&self, _ctx: &ActorContext, event: Event, origin: &str) -> FlowResult<()> {
        {
            let mut state = self.state.lock();
            let index = state.received.len();
            match state.expectations.pop_front() {
                Some(expectation) => {
                    if let Err(mismatch) = expectation.check(&event, origin) {
                        state.failures.push(format!("event #{index}: {mismatch}"));
                    }
                }
                None if state.expected_total > 0 => {
                    state.failures.push(format!("event #{index}: no expectation left"));
                }
                None => {}
            }
            state.received.push((origin.to_string(), event));
        }
        self.count.send_modify(|count| *count += 1);
        Ok(())
    }
}

/// Builder for event expectations.
pub struct EventExpectationBuilder<'a> {
    sink: &'a MockSink,
    expectation: Expectation,
}

impl EventExpectationBuilder<'_> {
    pub fn of_kind(mut self, kind: EventKind) -> Self {
        self.expectation.kind = Some(kind);
        self
    }

    /// The inbound queue the event must arrive on.
    pub fn from(mut self, origin: impl Into<String>) -> Self {
        self.expectation.origin = Some(origin.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<Payload>) -> Self {
        self.expectation.data = Some(data.into());
        self
    }

    /// The event must carry a fault.
    pub fn faulted(mut self) -> Self {
        self.expectation.faulted = Some(true);
        self
    }

    /// Registers the expectation for exactly one event.
    pub fn once(self) {
        self.times(1);
    }

    /// Registers the expectation for the next `n` events.
    pub fn times(self, n: usize) {
        self.sink.push(self.expectation, n);
    }
}
