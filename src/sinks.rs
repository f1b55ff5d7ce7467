//! Terminal actors used as the Director's default sinks.
//!
//! - [`LogSink`] renders log events through `tracing` at their own level.
//! - [`ErrorLogger`] reports every faulted event through the actor logger.
//! - [`Null`] discards everything.
//!
//! None of them forward events.

use crate::actor::{Actor, ActorContext};
use crate::error::FlowResult;
use crate::event::Event;
use crate::logger::LogLevel;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// Default log sink.
///
/// It must never log through its own [`crate::logger::Logger`] while
/// consuming: its `logs` slot feeds back into itself.
#[derive(Debug, Default)]
pub struct LogSink {
    rendered: AtomicU64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events rendered so far.
    pub fn rendered(&self) -> u64 {
        self.rendered.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Actor for LogSink {
    async fn consume(&self, _ctx: &ActorContext, event: Event, origin: &str) -> FlowResult<()> {
        self.rendered.fetch_add(1, Ordering::Relaxed);
        let Some(record) = event.log_record() else {
            info!(origin, event_id = event.event_id(), data = %event.data_string(), "Event");
            return Ok(());
        };

        let actor = record.origin_actor.as_str();
        let id = record.id.as_deref();
        let message = record.message.as_str();
        match record.level {
            LogLevel::Critical | LogLevel::Error => error!(actor, id, time = %record.time, "{message}"),
            LogLevel::Warning => warn!(actor, id, time = %record.time, "{message}"),
            LogLevel::Info => info!(actor, id, time = %record.time, "{message}"),
            LogLevel::Debug => debug!(actor, id, time = %record.time, "{message}"),
        }
        Ok(())
    }
}

/// Default error sink: turns each faulted event into an error log line.
#[derive(Debug, Default)]
pub struct ErrorLogger;

#[async_trait]
impl Actor for ErrorLogger {
    async fn consume(&self, ctx: &ActorContext, event: Event, origin: &str) -> FlowResult<()> {
        let message = match event.error() {
            Some(fault) => format!("Error event from '{origin}': {fault}"),
            None => format!("Event from '{origin}' reached the error sink without a fault"),
        };
        ctx.logger().error(&message, Some(&event));
        Ok(())
    }
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct Null;

#[async_trait]
impl Actor for Null {
    async fn consume(&self, ctx: &ActorContext, event: Event, origin: &str) -> FlowResult<()> {
        debug!(actor = ctx.name(), origin, event_id = event.event_id(), "Discarded");
        Ok(())
    }
}
