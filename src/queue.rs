//! # Queues & Queue Pools
//!
//! A [`Queue`] is a bounded FIFO link between actors and the only flow control
//! in the runtime: `put` waits while the queue is full, `get` waits while it is
//! empty. Cloning a `Queue` clones the handle, not the contents, which is how a
//! source's outbound slot and a destination's inbound slot end up referring to
//! the same instance.
//!
//! A [`QueuePool`] groups an actor's queues into four named partitions:
//!
//! - **inbound**: one entry per upstream link, in registration order
//! - **outbound**: every queue [`crate::actor::ActorContext::send_event`] writes to
//! - **error**: where failed events are routed
//! - **log**: where the actor's [`crate::logger::Logger`] writes log events

use crate::error::{FlowError, FlowResult};
use crate::event::Event;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Capacity used when an actor is registered without an explicit queue size.
pub const DEFAULT_QUEUE_SIZE: usize = 500;

// =============================================================================
// QUEUE
// =============================================================================

struct QueueInner {
    name: String,
    capacity: usize,
    tx: mpsc::Sender<Event>,
    rx: Mutex<mpsc::Receiver<Event>>,
}

/// Bounded multi-producer, single-consumer event queue.
#[derive(Clone)]
pub struct Queue {
    inner: Arc<QueueInner>,
}

impl Queue {
    /// Creates a queue. A capacity of zero is raised to one.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            inner: Arc::new(QueueInner {
                name: name.into(),
                capacity,
                tx,
                rx: Mutex::new(rx),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of events currently waiting in the queue.
    pub fn len(&self) -> usize {
        self.inner.capacity - self.inner.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when both handles point at the same queue instance.
    pub fn same_as(&self, other: &Queue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Enqueues an event, waiting for room while the queue is full.
    pub async fn put(&self, event: Event) -> FlowResult<()> {
        self.inner
            .tx
            .send(event)
            .await
            .map_err(|_| FlowError::QueueClosed(self.inner.name.clone()))
    }

    /// Enqueues without waiting; fails with [`FlowError::QueueFull`] at capacity.
    pub fn try_put(&self, event: Event) -> FlowResult<()> {
        self.inner.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => FlowError::QueueFull(self.inner.name.clone()),
            mpsc::error::TrySendError::Closed(_) => FlowError::QueueClosed(self.inner.name.clone()),
        })
    }

    /// Dequeues the oldest event, waiting while the queue is empty.
    ///
    /// Cancel-safe: dropping the future before it completes loses no event.
    pub async fn get(&self) -> FlowResult<Event> {
        let mut rx = self.inner.rx.lock().await;
        rx.recv()
            .await
            .ok_or_else(|| FlowError::QueueClosed(self.inner.name.clone()))
    }

    /// Dequeues without waiting; fails with [`FlowError::QueueEmpty`] when nothing is queued.
    pub fn try_get(&self) -> FlowResult<Event> {
        let mut rx = self
            .inner
            .rx
            .try_lock()
            .map_err(|_| FlowError::QueueEmpty(self.inner.name.clone()))?;
        rx.try_recv().map_err(|e| match e {
            mpsc::error::TryRecvError::Empty => FlowError::QueueEmpty(self.inner.name.clone()),
            mpsc::error::TryRecvError::Disconnected => {
                FlowError::QueueClosed(self.inner.name.clone())
            }
        })
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.inner.name)
            .field("len", &self.len())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

// =============================================================================
// QUEUE POOL
// =============================================================================

/// The partitions of a pool an outbound link can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Outbound,
    Error,
    Log,
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Partition::Outbound => "outbound",
            Partition::Error => "error",
            Partition::Log => "log",
        })
    }
}

/// How [`QueuePool::attach`] treats a slot that is already wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectPolicy {
    /// Skip silently when the slot already holds the very same queue.
    pub check_existing: bool,
}

/// Insertion-ordered name → queue map.
type Slots = Vec<(String, Queue)>;

fn lookup<'a>(slots: &'a Slots, name: &str) -> Option<&'a Queue> {
    slots.iter().find(|(n, _)| n == name).map(|(_, q)| q)
}

/// The queues of one actor, grouped by partition.
#[derive(Debug, Clone, Default)]
pub struct QueuePool {
    inbound: Slots,
    outbound: Slots,
    error: Slots,
    log: Slots,
}

impl QueuePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inbound(&self, name: &str) -> Option<&Queue> {
        lookup(&self.inbound, name)
    }

    pub fn outbound(&self, name: &str) -> Option<&Queue> {
        lookup(&self.outbound, name)
    }

    pub fn error(&self, name: &str) -> Option<&Queue> {
        lookup(&self.error, name)
    }

    pub fn log(&self, name: &str) -> Option<&Queue> {
        lookup(&self.log, name)
    }

    /// Inbound queues in the order they were connected.
    pub fn inbound_queues(&self) -> impl Iterator<Item = (&str, &Queue)> {
        self.inbound.iter().map(|(n, q)| (n.as_str(), q))
    }

    pub fn inbound_names(&self) -> Vec<String> {
        self.inbound.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn outbound_queues(&self) -> impl Iterator<Item = (&str, &Queue)> {
        self.outbound.iter().map(|(n, q)| (n.as_str(), q))
    }

    pub fn error_queues(&self) -> impl Iterator<Item = &Queue> {
        self.error.iter().map(|(_, q)| q)
    }

    pub fn log_queues(&self) -> impl Iterator<Item = &Queue> {
        self.log.iter().map(|(_, q)| q)
    }

    pub fn has_error_queue(&self) -> bool {
        !self.error.is_empty()
    }

    pub fn partition(&self, partition: Partition) -> impl Iterator<Item = (&str, &Queue)> {
        let slots = match partition {
            Partition::Outbound => &self.outbound,
            Partition::Error => &self.error,
            Partition::Log => &self.log,
        };
        slots.iter().map(|(n, q)| (n.as_str(), q))
    }

    /// Adds an inbound queue. Fan-in reuses an existing inbound queue instead
    /// of adding a second one under the same name.
    pub fn add_inbound(&mut self, name: &str, queue: Queue) {
        if self.inbound(name).is_none() {
            self.inbound.push((name.to_string(), queue));
        }
    }

    /// Places `queue` in the named slot of a sending partition.
    ///
    /// Returns `Ok(false)` when the slot already holds this queue and the
    /// policy allows skipping; a slot holding any other queue, or the same
    /// queue without `check_existing`, fails with [`FlowError::QueueConnected`].
    pub fn attach(
        &mut self,
        partition: Partition,
        slot: &str,
        queue: Queue,
        policy: ConnectPolicy,
    ) -> FlowResult<bool> {
        let slots = match partition {
            Partition::Outbound => &mut self.outbound,
            Partition::Error => &mut self.error,
            Partition::Log => &mut self.log,
        };
        match lookup(slots, slot) {
            Some(existing) if existing.same_as(&queue) && policy.check_existing => Ok(false),
            Some(_) => Err(FlowError::QueueConnected(format!(
                "{partition} queue '{slot}' is already connected"
            ))),
            None => {
                slots.push((slot.to_string(), queue));
                Ok(true)
            }
        }
    }
}
