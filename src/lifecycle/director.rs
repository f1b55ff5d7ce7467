use crate::actor::{Actor, ActorCell, ActorState};
use crate::error::{FlowError, FlowResult};
use crate::lifecycle::config::DirectorConfig;
use crate::lifecycle::signal::shutdown_signal;
use crate::queue::{ConnectPolicy, Partition, Queue};
use crate::sinks::{ErrorLogger, LogSink};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Log slot every actor gets wired to the log sink under.
pub const LOG_SLOT: &str = "logs";

// =============================================================================
// ENDPOINTS
// =============================================================================

/// Handle to a registered actor, used to describe connections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActorRef {
    name: Arc<str>,
}

impl ActorRef {
    fn new(name: &str) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One side of a connection: an actor and, optionally, an explicit queue name.
///
/// Without a queue name the source slot is named after the destination actor
/// and the destination inbox after the source actor.
#[derive(Debug, Clone)]
pub struct Endpoint {
    actor: ActorRef,
    queue: Option<String>,
}

impl From<&ActorRef> for Endpoint {
    fn from(actor: &ActorRef) -> Self {
        Self {
            actor: actor.clone(),
            queue: None,
        }
    }
}

impl From<(&ActorRef, &str)> for Endpoint {
    fn from((actor, queue): (&ActorRef, &str)) -> Self {
        Self {
            actor: actor.clone(),
            queue: Some(queue.to_string()),
        }
    }
}

/// One or more destination endpoints. A list is an explicit fan-out.
#[derive(Debug, Clone)]
pub struct Destinations(Vec<Endpoint>);

impl From<&ActorRef> for Destinations {
    fn from(actor: &ActorRef) -> Self {
        Self(vec![actor.into()])
    }
}

impl From<(&ActorRef, &str)> for Destinations {
    fn from(endpoint: (&ActorRef, &str)) -> Self {
        Self(vec![endpoint.into()])
    }
}

impl From<Endpoint> for Destinations {
    fn from(endpoint: Endpoint) -> Self {
        Self(vec![endpoint])
    }
}

impl From<Vec<Endpoint>> for Destinations {
    fn from(endpoints: Vec<Endpoint>) -> Self {
        Self(endpoints)
    }
}

impl<const N: usize> From<[&ActorRef; N]> for Destinations {
    fn from(actors: [&ActorRef; N]) -> Self {
        Self(actors.into_iter().map(Endpoint::from).collect())
    }
}

impl From<&[&ActorRef]> for Destinations {
    fn from(actors: &[&ActorRef]) -> Self {
        Self(actors.iter().map(|actor| Endpoint::from(*actor)).collect())
    }
}

// =============================================================================
// DIRECTOR
// =============================================================================

/// Requests a running [`Director::run`] to shut down.
#[derive(Debug, Clone)]
pub struct DirectorHandle {
    token: CancellationToken,
}

impl DirectorHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Actor(usize),
    LogSink,
    ErrorSink,
}

/// Builds the actor graph and drives its coordinated start and stop.
///
/// # Responsibilities
///
/// - **Registry**: actor names are unique; the two sink names are reserved.
/// - **Wiring**: [`Director::connect_queue`] and friends make a source slot
///   and a destination inbox share one [`Queue`].
/// - **Default wiring** at start: every ordinary actor without an error queue
///   is wired to the error sink, and every actor (sinks included) has its
///   [`LOG_SLOT`] wired to the log sink.
/// - **Lifecycle**: ordinary actors start first, then the log sink, then the
///   error sink. On stop ordinary actors go first, then the error sink, and
///   the log sink last so it can still receive everyone's final records.
///
/// # Example
///
/// ```ignore
/// let mut director = Director::new(DirectorConfig::default());
/// let source = director.register_actor("source", Generator::new())?;
/// let sink = director.register_actor("sink", Printer)?;
/// director.connect_queue(&source, &sink)?;
///
/// director.start().await?;
/// // ...
/// director.stop().await;
/// ```
pub struct Director {
    config: DirectorConfig,
    actors: Vec<ActorCell>,
    log_sink: ActorCell,
    error_sink: ActorCell,
    started: bool,
    shutdown: CancellationToken,
}

impl Default for Director {
    fn default() -> Self {
        Self::new(DirectorConfig::default())
    }
}

impl Director {
    pub fn new(config: DirectorConfig) -> Self {
        let log_sink = ActorCell::new(&config.log_actor_name, Arc::new(LogSink::new()), config.queue_size);
        let error_sink = ActorCell::new(&config.error_actor_name, Arc::new(ErrorLogger), config.queue_size);
        Self {
            config,
            actors: Vec::new(),
            log_sink,
            error_sink,
            started: false,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    // --- registry ---

    /// Registers an actor with the configured queue size.
    pub fn register_actor(&mut self, name: &str, actor: impl Actor) -> FlowResult<ActorRef> {
        self.register_actor_with_size(name, actor, self.config.queue_size)
    }

    pub fn register_actor_with_size(
        &mut self,
        name: &str,
        actor: impl Actor,
        queue_size: usize,
    ) -> FlowResult<ActorRef> {
        self.ensure_not_started()?;
        if name.is_empty() {
            return Err(FlowError::SetupError("actor name cannot be empty".into()));
        }
        if name == self.log_sink.name() || name == self.error_sink.name() {
            return Err(FlowError::SetupError(format!("actor name '{name}' is reserved")));
        }
        if self.actors.iter().any(|cell| cell.name() == name) {
            return Err(FlowError::SetupError(format!("actor '{name}' is already registered")));
        }
        self.actors.push(ActorCell::new(name, Arc::new(actor), queue_size));
        debug!(director = %self.config.name, actor = name, queue_size, "Registered actor");
        Ok(ActorRef::new(name))
    }

    /// Replaces the default log sink.
    pub fn register_log_actor(&mut self, actor: impl Actor) -> FlowResult<ActorRef> {
        self.ensure_not_started()?;
        self.log_sink.replace_actor(Arc::new(actor));
        Ok(self.log_actor())
    }

    /// Replaces the default error sink.
    pub fn register_error_actor(&mut self, actor: impl Actor) -> FlowResult<ActorRef> {
        self.ensure_not_started()?;
        self.error_sink.replace_actor(Arc::new(actor));
        Ok(self.error_actor())
    }

    pub fn log_actor(&self) -> ActorRef {
        ActorRef::new(self.log_sink.name())
    }

    pub fn error_actor(&self) -> ActorRef {
        ActorRef::new(self.error_sink.name())
    }

    /// Looks up a registered actor (sinks included) by name.
    pub fn actor(&self, name: &str) -> Option<ActorRef> {
        self.slot_of(name).ok().map(|_| ActorRef::new(name))
    }

    pub fn actor_state(&self, name: &str) -> Option<ActorState> {
        let slot = self.slot_of(name).ok()?;
        Some(self.cell_ref(slot).state())
    }

    pub fn handle(&self) -> DirectorHandle {
        DirectorHandle {
            token: self.shutdown.clone(),
        }
    }

    // --- wiring ---

    /// Connects a source's outbound slot to one or more destinations.
    pub fn connect_queue(
        &mut self,
        source: impl Into<Endpoint>,
        destinations: impl Into<Destinations>,
    ) -> FlowResult<()> {
        self.connect_all(Partition::Outbound, source.into(), destinations.into(), ConnectPolicy::default())
    }

    /// [`Director::connect_queue`] with an explicit policy for already wired slots.
    pub fn connect_queue_with(
        &mut self,
        source: impl Into<Endpoint>,
        destinations: impl Into<Destinations>,
        policy: ConnectPolicy,
    ) -> FlowResult<()> {
        self.connect_all(Partition::Outbound, source.into(), destinations.into(), policy)
    }

    /// Routes the source's error partition to the destinations. Explicit
    /// error wiring is never overridden by the default wiring pass.
    pub fn connect_error_queue(
        &mut self,
        source: impl Into<Endpoint>,
        destinations: impl Into<Destinations>,
    ) -> FlowResult<()> {
        self.connect_all(Partition::Error, source.into(), destinations.into(), ConnectPolicy::default())
    }

    pub fn connect_log_queue(
        &mut self,
        source: impl Into<Endpoint>,
        destinations: impl Into<Destinations>,
    ) -> FlowResult<()> {
        self.connect_all(Partition::Log, source.into(), destinations.into(), ConnectPolicy::default())
    }

    fn connect_all(
        &mut self,
        partition: Partition,
        source: Endpoint,
        destinations: Destinations,
        policy: ConnectPolicy,
    ) -> FlowResult<()> {
        for destination in &destinations.0 {
            self.connect(partition, &source, destination, policy)?;
        }
        Ok(())
    }

    fn connect(
        &mut self,
        partition: Partition,
        source: &Endpoint,
        destination: &Endpoint,
        policy: ConnectPolicy,
    ) -> FlowResult<()> {
        self.ensure_not_started()?;
        let src = self.slot_of(source.actor.name())?;
        let dst = self.slot_of(destination.actor.name())?;
        let slot = source
            .queue
            .clone()
            .unwrap_or_else(|| destination.actor.name().to_string());
        let inbox = destination
            .queue
            .clone()
            .unwrap_or_else(|| source.actor.name().to_string());

        let target = self.cell(dst);
        let existing = target.pool.inbound(&inbox).cloned();
        let queue = match &existing {
            Some(queue) => queue.clone(),
            None => Queue::new(inbox.as_str(), target.queue_size),
        };

        let attached = self.cell(src).pool.attach(partition, &slot, queue.clone(), policy)?;
        if existing.is_none() {
            self.cell(dst).pool.add_inbound(&inbox, queue);
        }
        if attached {
            debug!(
                source = source.actor.name(),
                %partition,
                slot = %slot,
                destination = destination.actor.name(),
                inbox = %inbox,
                "Connected"
            );
        }
        Ok(())
    }

    fn wire_defaults(&mut self) -> FlowResult<()> {
        let policy = ConnectPolicy { check_existing: true };
        let error_sink = Endpoint::from(&self.error_actor());
        let log_sink = Endpoint::from(&self.log_actor());

        let unwired: Vec<ActorRef> = self
            .actors
            .iter()
            .filter(|cell| !cell.pool.has_error_queue())
            .map(|cell| ActorRef::new(cell.name()))
            .collect();
        for actor in &unwired {
            self.connect(Partition::Error, &actor.into(), &error_sink, policy)?;
        }

        let everyone: Vec<ActorRef> = self
            .actors
            .iter()
            .chain([&self.error_sink, &self.log_sink])
            .map(|cell| ActorRef::new(cell.name()))
            .collect();
        for actor in &everyone {
            if self.feeds_log_sink(actor.name())? {
                continue;
            }
            self.connect(Partition::Log, &(actor, LOG_SLOT).into(), &log_sink, policy)?;
        }
        Ok(())
    }

    /// True if the actor's log output already reaches the log sink.
    fn feeds_log_sink(&self, name: &str) -> FlowResult<bool> {
        let cell = self.cell_ref(self.slot_of(name)?);
        if cell.pool.log(LOG_SLOT).is_some() {
            return Ok(true);
        }
        let Some(sink_queue) = self.log_sink.pool.inbound(name) else {
            return Ok(false);
        };
        Ok(cell.pool.log_queues().any(|queue| queue.same_as(sink_queue)))
    }

    // --- lifecycle ---

    /// Validates the config, runs the default wiring pass and starts every actor.
    ///
    /// If any actor fails to start, the actors already started are stopped
    /// and the error is returned.
    pub async fn start(&mut self) -> FlowResult<()> {
        self.ensure_not_started()?;
        self.config.validate()?;
        self.wire_defaults()?;
        self.started = true;
        info!(director = %self.config.name, actors = self.actors.len(), "Starting");

        for slot in self.start_order() {
            if let Err(e) = self.cell(slot).start().await {
                error!(
                    director = %self.config.name,
                    actor = self.cell_ref(slot).name(),
                    error = %e,
                    "Start failed, rolling back"
                );
                self.stop().await;
                return Err(e);
            }
        }
        info!(director = %self.config.name, "Started");
        Ok(())
    }

    /// Stops every actor. Always completes; failures are logged.
    pub async fn stop(&mut self) {
        info!(director = %self.config.name, "Stopping");
        for slot in self.stop_order() {
            self.cell(slot).stop().await;
        }
        info!(director = %self.config.name, "Stopped");
    }

    /// Starts the graph and blocks until SIGINT/SIGTERM or
    /// [`DirectorHandle::stop`], then stops it.
    pub async fn run(&mut self) -> FlowResult<()> {
        self.start().await?;
        let token = self.shutdown.clone();
        tokio::select! {
            _ = shutdown_signal() => {}
            _ = token.cancelled() => info!(director = %self.config.name, "Stop requested"),
        }
        self.stop().await;
        Ok(())
    }

    // --- internals ---

    fn ensure_not_started(&self) -> FlowResult<()> {
        if self.started {
            return Err(FlowError::SetupError(format!(
                "director '{}' has already started",
                self.config.name
            )));
        }
        Ok(())
    }

    fn slot_of(&self, name: &str) -> FlowResult<Slot> {
        if let Some(index) = self.actors.iter().position(|cell| cell.name() == name) {
            return Ok(Slot::Actor(index));
        }
        if name == self.log_sink.name() {
            return Ok(Slot::LogSink);
        }
        if name == self.error_sink.name() {
            return Ok(Slot::ErrorSink);
        }
        Err(FlowError::ResourceNotFound(format!("no actor named '{name}'")))
    }

    fn cell(&mut self, slot: Slot) -> &mut ActorCell {
        match slot {
            Slot::Actor(index) => &mut self.actors[index],
            Slot::LogSink => &mut self.log_sink,
            Slot::ErrorSink => &mut self.error_sink,
        }
    }

    fn cell_ref(&self, slot: Slot) -> &ActorCell {
        match slot {
            Slot::Actor(index) => &self.actors[index],
            Slot::LogSink => &self.log_sink,
            Slot::ErrorSink => &self.error_sink,
        }
    }

    fn start_order(&self) -> Vec<Slot> {
        (0..self.actors.len())
            .map(Slot::Actor)
            .chain([Slot::LogSink, Slot::ErrorSink])
            .collect()
    }

    fn stop_order(&self) -> Vec<Slot> {
        (0..self.actors.len())
            .map(Slot::Actor)
            .chain([Slot::ErrorSink, Slot::LogSink])
            .collect()
    }
}
