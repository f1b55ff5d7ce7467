//! # In-graph Logging
//!
//! Every actor owns a [`Logger`]. A log call does two things: it emits a
//! `tracing` event on the local subscriber, and it puts a `LogEvent` on every
//! queue of the actor's log partition so that the graph's log sink (or any
//! actor wired to the `logs` slot) sees it as ordinary traffic.
//!
//! Logging never applies backpressure. A full log queue drops the record (the
//! `tracing` line has already been written), so an actor logging into its own
//! inbound queue cannot deadlock itself.

use crate::event::Event;
use crate::queue::Queue;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Severity of a log record, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Critical => "critical",
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payload of a log event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// `meta_id` of the event the record is about, if any.
    pub id: Option<String>,
    pub level: LogLevel,
    pub time: String,
    pub origin_actor: String,
    pub message: String,
}

impl LogRecord {
    pub fn new(level: LogLevel, origin_actor: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: None,
            level,
            time: Local::now().format("%Y-%m-%d %H:%M:%S,%3f").to_string(),
            origin_actor: origin_actor.into(),
            message: message.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Per-actor log handle. Cheap to clone.
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    queues: Arc<[Queue]>,
}

impl Logger {
    pub fn new(name: impl Into<Arc<str>>, queues: Vec<Queue>) -> Self {
        Self {
            name: name.into(),
            queues: queues.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self, level: LogLevel, message: &str, event: Option<&Event>) {
        self.log_for(level, message, event.map(Event::meta_id));
    }

    /// Logs against an explicit correlation id instead of an event.
    pub fn log_for(&self, level: LogLevel, message: &str, id: Option<&str>) {
        let actor = &*self.name;
        match level {
            LogLevel::Critical | LogLevel::Error => error!(actor, id, "{message}"),
            LogLevel::Warning => warn!(actor, id, "{message}"),
            LogLevel::Info => info!(actor, id, "{message}"),
            LogLevel::Debug => debug!(actor, id, "{message}"),
        }

        if self.queues.is_empty() {
            return;
        }
        let mut record = LogRecord::new(level, actor, message);
        if let Some(id) = id {
            record = record.with_id(id);
        }
        let log_event = Event::log(record);
        for queue in self.queues.iter() {
            if let Err(e) = queue.try_put(log_event.clone()) {
                debug!(actor, queue = queue.name(), error = %e, "Log record dropped");
            }
        }
    }

    pub fn critical(&self, message: &str, event: Option<&Event>) {
        self.log(LogLevel::Critical, message, event);
    }

    pub fn error(&self, message: &str, event: Option<&Event>) {
        self.log(LogLevel::Error, message, event);
    }

    pub fn warn(&self, message: &str, event: Option<&Event>) {
        self.log(LogLevel::Warning, message, event);
    }

    pub fn info(&self, message: &str, event: Option<&Event>) {
        self.log(LogLevel::Info, message, event);
    }

    pub fn debug(&self, message: &str, event: Option<&Event>) {
        self.log(LogLevel::Debug, message, event);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("queues", &self.queues.len())
            .finish()
    }
}
