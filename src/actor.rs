//! # Actors
//!
//! An actor is a unit of processing wired into the graph by queues. Users
//! implement the [`Actor`] trait (mostly just [`Actor::consume`]); the runtime
//! owns everything else: the consumption loops, state transitions, input
//! validation and failure containment.
//!
//! ## Lifecycle
//!
//! ```text
//! Initialized -> PreHook -> Running -> Stopping -> PostHook -> Stopped
//! ```
//!
//! - **start**: runs [`Actor::pre_hook`], then spawns one consumption loop per
//!   inbound queue. A failing pre-hook aborts start with
//!   [`FlowError::ActorInitFailure`].
//! - **stop**: cancels the actor's token, which unblocks every loop waiting on
//!   an empty queue. An event already inside `consume` runs to completion.
//!   Background tasks registered through [`ActorContext::spawn`] are awaited,
//!   then [`Actor::post_hook`] runs. Post-hook failures are logged, never returned.
//!
//! ## Failure containment
//!
//! Each event is consumed in its own task. An `Err` from `consume` or a panic
//! inside it is logged against the event's `meta_id` and the loop moves on;
//! nothing is forwarded automatically.

use crate::error::{FlowError, FlowResult};
use crate::event::{Event, EventKind};
use crate::logger::{LogLevel, Logger};
use crate::queue::{Queue, QueuePool};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// =============================================================================
// 1. THE CONTRACT
// =============================================================================

/// A processing stage in the graph.
///
/// `consume` is called once per inbound event with the name of the inbound
/// queue it arrived on. Implementations forward results explicitly through
/// [`ActorContext::send_event`] (or route failures with
/// [`ActorContext::send_error`]); returning `Err` only logs.
///
/// # Declared kinds
///
/// [`Actor::input_kinds`] lists the kinds the actor accepts. An inbound event
/// whose kind does not descend from one of them is converted to the first
/// entry; if that fails the event is faulted with
/// [`FlowError::InvalidActorInput`] and routed to the error partition.
/// [`Actor::output_kinds`] is checked by `send_event`. Both default to
/// `[EventKind::Plain]`, which every kind descends from.
#[async_trait]
pub trait Actor: Send + Sync + 'static {
    fn input_kinds(&self) -> &[EventKind] {
        &[EventKind::Plain]
    }

    fn output_kinds(&self) -> &[EventKind] {
        &[EventKind::Plain]
    }

    /// Runs before any consumption loop starts. Register background tasks here.
    async fn pre_hook(&self, _ctx: &ActorContext) -> FlowResult<()> {
        Ok(())
    }

    /// Runs after every loop and background task has exited.
    async fn post_hook(&self, _ctx: &ActorContext) -> FlowResult<()> {
        Ok(())
    }

    async fn consume(&self, ctx: &ActorContext, event: Event, origin: &str) -> FlowResult<()>;
}

#[async_trait]
impl<A: Actor + ?Sized> Actor for Arc<A> {
    fn input_kinds(&self) -> &[EventKind] {
        (**self).input_kinds()
    }

    fn output_kinds(&self) -> &[EventKind] {
        (**self).output_kinds()
    }

    async fn pre_hook(&self, ctx: &ActorContext) -> FlowResult<()> {
        (**self).pre_hook(ctx).await
    }

    async fn post_hook(&self, ctx: &ActorContext) -> FlowResult<()> {
        (**self).post_hook(ctx).await
    }

    async fn consume(&self, ctx: &ActorContext, event: Event, origin: &str) -> FlowResult<()> {
        (**self).consume(ctx, event, origin).await
    }
}

/// Observable lifecycle state of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorState {
    Initialized,
    PreHook,
    Running,
    Stopping,
    PostHook,
    Stopped,
}

impl fmt::Display for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// 2. THE CONTEXT
// =============================================================================

/// Everything an actor needs while running: its queues, logger and stop signal.
///
/// Cloning is cheap; clones share the same queues and cancellation token.
#[derive(Clone)]
pub struct ActorContext {
    name: Arc<str>,
    pool: Arc<QueuePool>,
    logger: Logger,
    output_kinds: Arc<[EventKind]>,
    token: CancellationToken,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ActorContext {
    pub(crate) fn new(name: Arc<str>, pool: QueuePool, output_kinds: &[EventKind]) -> Self {
        let logger = Logger::new(name.clone(), pool.log_queues().cloned().collect());
        Self {
            name,
            pool: Arc::new(pool),
            logger,
            output_kinds: output_kinds.into(),
            token: CancellationToken::new(),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> &QueuePool {
        &self.pool
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// False once the actor has been asked to stop.
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Resolves when the actor is asked to stop.
    pub fn cancelled(&self) -> impl Future<Output = ()> + Send + '_ {
        self.token.cancelled()
    }

    /// Sleeps for `duration`; returns `false` early if the actor is stopping.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Spawns a background task that shares the actor's lifetime.
    ///
    /// The task should watch [`ActorContext::cancelled`]; `stop` waits for it.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        self.tasks.lock().push(handle);
    }

    /// Sends a clone of `event` to every outbound queue, waiting on full queues.
    pub async fn send_event(&self, event: Event) -> FlowResult<()> {
        self.check_output(&event)?;
        let outbound: Vec<Queue> = self.pool.outbound_queues().map(|(_, q)| q.clone()).collect();
        if outbound.is_empty() {
            debug!(actor = %self.name, event_id = event.event_id(), "No outbound queue, event dropped");
            return Ok(());
        }
        for queue in outbound {
            self.put(&queue, event.clone()).await?;
        }
        Ok(())
    }

    /// Sends `event` only to the named outbound queues.
    ///
    /// Every name is resolved before anything is sent; an unknown name fails
    /// with [`FlowError::ResourceNotFound`].
    pub async fn send_event_to(&self, event: Event, names: &[&str]) -> FlowResult<()> {
        self.check_output(&event)?;
        let targets = names
            .iter()
            .map(|name| {
                self.pool.outbound(name).cloned().ok_or_else(|| {
                    FlowError::ResourceNotFound(format!(
                        "{} has no outbound queue named '{name}'",
                        self.name
                    ))
                })
            })
            .collect::<FlowResult<Vec<_>>>()?;
        for queue in targets {
            self.put(&queue, event.clone()).await?;
        }
        Ok(())
    }

    /// Routes an event to the error partition. Without an error queue the
    /// event is dropped with a warning.
    pub async fn send_error(&self, event: Event) -> FlowResult<()> {
        let queues: Vec<Queue> = self.pool.error_queues().cloned().collect();
        if queues.is_empty() {
            self.logger.warn("No error queue connected, error event dropped", Some(&event));
            return Ok(());
        }
        for queue in queues {
            self.put(&queue, event.clone()).await?;
        }
        Ok(())
    }

    fn check_output(&self, event: &Event) -> FlowResult<()> {
        let kind = event.kind();
        if self.output_kinds.is_empty() || self.output_kinds.iter().any(|k| kind.descends_from(*k)) {
            return Ok(());
        }
        Err(FlowError::InvalidActorOutput(format!(
            "{} cannot send {kind}, declared outputs are {:?}",
            self.name,
            self.output_kinds.iter().map(|k| k.name()).collect::<Vec<_>>()
        )))
    }

    /// Puts with backpressure, giving up only if the actor is stopped while
    /// the queue is still full.
    async fn put(&self, queue: &Queue, event: Event) -> FlowResult<()> {
        tokio::select! {
            biased;
            result = queue.put(event) => result,
            _ = self.token.cancelled() => Err(FlowError::QueueFull(format!(
                "{} stopped while '{}' was full",
                self.name,
                queue.name()
            ))),
        }
    }

    fn take_tasks(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.tasks.lock())
    }
}

impl fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorContext")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

// =============================================================================
// 3. THE RUNTIME
// =============================================================================

/// Runtime wrapper around one registered actor: its queues, state and loops.
pub(crate) struct ActorCell {
    name: Arc<str>,
    actor: Arc<dyn Actor>,
    pub(crate) pool: QueuePool,
    pub(crate) queue_size: usize,
    state: Arc<RwLock<ActorState>>,
    running: Option<ActorContext>,
}

impl ActorCell {
    pub(crate) fn new(name: &str, actor: Arc<dyn Actor>, queue_size: usize) -> Self {
        Self {
            name: name.into(),
            actor,
            pool: QueuePool::new(),
            queue_size,
            state: Arc::new(RwLock::new(ActorState::Initialized)),
            running: None,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> ActorState {
        *self.state.read()
    }

    pub(crate) fn replace_actor(&mut self, actor: Arc<dyn Actor>) {
        self.actor = actor;
    }

    fn set_state(&self, state: ActorState) {
        *self.state.write() = state;
        debug!(actor = %self.name, %state, "State changed");
    }

    pub(crate) async fn start(&mut self) -> FlowResult<()> {
        if self.state() != ActorState::Initialized {
            return Err(FlowError::SetupError(format!(
                "{} cannot start from state {}",
                self.name,
                self.state()
            )));
        }

        let ctx = ActorContext::new(self.name.clone(), self.pool.clone(), self.actor.output_kinds());
        self.set_state(ActorState::PreHook);
        if let Err(e) = self.actor.pre_hook(&ctx).await {
            ctx.token.cancel();
            join_all(&ctx).await;
            self.set_state(ActorState::Stopped);
            error!(actor = %self.name, error = %e, "Pre-hook failed");
            return Err(FlowError::ActorInitFailure(format!("{}: {e}", self.name)));
        }

        self.set_state(ActorState::Running);
        let inbound: Vec<(Arc<str>, Queue)> = ctx
            .pool
            .inbound_queues()
            .map(|(name, queue)| (Arc::from(name), queue.clone()))
            .collect();
        let loops = inbound.len();
        for (origin, queue) in inbound {
            let handle = tokio::spawn(consume_loop(self.actor.clone(), ctx.clone(), origin, queue));
            ctx.tasks.lock().push(handle);
        }
        info!(actor = %self.name, loops, "Actor started");
        self.running = Some(ctx);
        Ok(())
    }

    /// Stops the actor. Calling it on an actor that never started is a no-op.
    pub(crate) async fn stop(&mut self) {
        let Some(ctx) = self.running.take() else {
            return;
        };
        self.set_state(ActorState::Stopping);
        ctx.token.cancel();
        join_all(&ctx).await;

        self.set_state(ActorState::PostHook);
        if let Err(e) = self.actor.post_hook(&ctx).await {
            ctx.logger.error(&format!("Post-hook failed: {e}"), None);
        }
        self.set_state(ActorState::Stopped);
        info!(actor = %self.name, "Actor stopped");
    }
}

/// Awaits every loop and background task, including ones spawned while waiting.
async fn join_all(ctx: &ActorContext) {
    loop {
        let handles = ctx.take_tasks();
        if handles.is_empty() {
            return;
        }
        for handle in handles {
            if let Err(e) = handle.await {
                error!(actor = %ctx.name, error = %e, "Actor task failed");
            }
        }
    }
}

async fn consume_loop(actor: Arc<dyn Actor>, ctx: ActorContext, origin: Arc<str>, queue: Queue) {
    debug!(actor = %ctx.name, origin = %origin, "Consumption loop started");
    loop {
        let event = tokio::select! {
            biased;
            _ = ctx.token.cancelled() => break,
            event = queue.get() => match event {
                Ok(event) => event,
                Err(e) => {
                    warn!(actor = %ctx.name, origin = %origin, error = %e, "Inbound queue closed");
                    break;
                }
            },
        };

        let Some(event) = admit(actor.as_ref(), &ctx, event).await else {
            continue;
        };

        let meta_id = event.meta_id().to_string();
        let task = {
            let actor = actor.clone();
            let ctx = ctx.clone();
            let origin = origin.clone();
            tokio::spawn(async move { actor.consume(&ctx, event, &origin).await })
        };
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => ctx.logger.log_for(
                LogLevel::Error,
                &format!("Failed to consume event from '{origin}': {e}"),
                Some(&meta_id),
            ),
            Err(e) if e.is_panic() => ctx.logger.log_for(
                LogLevel::Error,
                &format!("Panic while consuming event from '{origin}'"),
                Some(&meta_id),
            ),
            Err(e) => warn!(actor = %ctx.name, error = %e, "Consume task cancelled"),
        }
    }
    debug!(actor = %ctx.name, origin = %origin, "Consumption loop exited");
}

/// Validates an inbound event against the declared input kinds, converting it
/// when needed. Rejected events are faulted and routed to the error partition.
async fn admit(actor: &dyn Actor, ctx: &ActorContext, event: Event) -> Option<Event> {
    let target = {
        let accepted = actor.input_kinds();
        if accepted.is_empty() || accepted.iter().any(|k| event.kind().descends_from(*k)) {
            return Some(event);
        }
        accepted[0]
    };

    match event.convert(target, false) {
        Ok(converted) => Some(converted),
        Err(e) => {
            let fault = FlowError::InvalidActorInput(format!(
                "{} expected {target}, got {}: {}",
                ctx.name,
                event.kind(),
                e.message()
            ));
            ctx.logger.error(&fault.to_string(), Some(&event));
            if let Err(e) = ctx.send_error(event.apply_fault(Some(fault))).await {
                warn!(actor = %ctx.name, error = %e, "Could not route rejected event");
            }
            None
        }
    }
}
