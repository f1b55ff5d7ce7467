//! # Flow Errors
//!
//! This module defines the error taxonomy used throughout the runtime. The same
//! enum is returned from fallible APIs *and* attached to events as their fault,
//! which is why it is `Clone` and serializable: an event carrying a fault can be
//! fanned out to several queues or shipped across a process boundary.
//!
//! Errors are grouped by kind rather than by where they are raised:
//!
//! - **data modification**: a payload or attribute was incompatible with the event kind
//! - **conversion**: an event could not be converted to another kind
//! - **queue state**: a queue was already connected, full, empty or closed
//! - **initialization**: an actor or the graph could not be brought up
//! - **resource / authorization / rate / service**: faults raised by actors while
//!   handling an event, mapped to HTTP statuses by [`crate::event::status`]

use serde::{Deserialize, Serialize};

/// Convenience alias used by every fallible API in the crate.
pub type FlowResult<T> = Result<T, FlowError>;

/// Errors that can occur within the runtime or be attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum FlowError {
    // --- data modification ---
    #[error("Invalid event data modification: {0}")]
    InvalidEventDataModification(String),
    #[error("Invalid event modification: {0}")]
    InvalidEventModification(String),
    #[error("Malformed event data: {0}")]
    MalformedEventData(String),
    #[error("Unprocessable event data: {0}")]
    UnprocessableEventData(String),
    #[error("Event attribute error: {0}")]
    EventAttributeError(String),

    // --- conversion ---
    #[error("Invalid event conversion: {0}")]
    InvalidEventConversion(String),

    // --- queue state ---
    #[error("Queue already connected: {0}")]
    QueueConnected(String),
    #[error("Queue full: {0}")]
    QueueFull(String),
    #[error("Queue empty: {0}")]
    QueueEmpty(String),
    #[error("Queue closed: {0}")]
    QueueClosed(String),

    // --- initialization ---
    #[error("Actor initialization failed: {0}")]
    ActorInitFailure(String),
    #[error("Setup error: {0}")]
    SetupError(String),

    // --- actor contract ---
    #[error("Invalid actor input: {0}")]
    InvalidActorInput(String),
    #[error("Invalid actor output: {0}")]
    InvalidActorOutput(String),

    // --- resource ---
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
    #[error("Resource not modified: {0}")]
    ResourceNotModified(String),
    #[error("Resource conflict: {0}")]
    ResourceConflict(String),
    #[error("Resource gone: {0}")]
    ResourceGone(String),

    // --- authorization ---
    #[error("Unauthorized event: {0}")]
    UnauthorizedEvent(String),
    #[error("Forbidden event: {0}")]
    ForbiddenEvent(String),

    // --- rate / timeout ---
    #[error("Event rate exceeded: {0}")]
    EventRateExceeded(String),
    #[error("Actor timeout: {0}")]
    ActorTimeout(String),

    // --- command / service ---
    #[error("Event command not allowed: {0}")]
    EventCommandNotAllowed(String),
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowError {
    /// The human readable message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            FlowError::InvalidEventDataModification(m)
            | FlowError::InvalidEventModification(m)
            | FlowError::MalformedEventData(m)
            | FlowError::UnprocessableEventData(m)
            | FlowError::EventAttributeError(m)
            | FlowError::InvalidEventConversion(m)
            | FlowError::QueueConnected(m)
            | FlowError::QueueFull(m)
            | FlowError::QueueEmpty(m)
            | FlowError::QueueClosed(m)
            | FlowError::ActorInitFailure(m)
            | FlowError::SetupError(m)
            | FlowError::InvalidActorInput(m)
            | FlowError::InvalidActorOutput(m)
            | FlowError::ResourceNotFound(m)
            | FlowError::ResourceNotModified(m)
            | FlowError::ResourceConflict(m)
            | FlowError::ResourceGone(m)
            | FlowError::UnauthorizedEvent(m)
            | FlowError::ForbiddenEvent(m)
            | FlowError::EventRateExceeded(m)
            | FlowError::ActorTimeout(m)
            | FlowError::EventCommandNotAllowed(m)
            | FlowError::ServiceUnavailable(m)
            | FlowError::Internal(m) => m,
        }
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::MalformedEventData(err.to_string())
    }
}
