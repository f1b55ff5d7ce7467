//! # Graph Lifecycle & Orchestration
//!
//! Individual actors are simple; wiring them together and bringing them up
//! and down in the right order is where the complexity lives. This module is
//! the conductor.
//!
//! ## Main Components
//!
//! - [`Director`]: registers actors, wires queues between them, attaches every
//!   actor's error and log output to the shared sinks, and drives start/stop
//! - [`DirectorConfig`]: names and queue sizes, loadable from TOML
//! - [`shutdown_signal`]: SIGINT/SIGTERM, used by [`Director::run`]
//! - [`setup_tracing`]: the process-wide subscriber
//!
//! ## Failure Semantics
//!
//! - **Bring-up** is all or nothing: a wiring error or a failing pre-hook
//!   stops every actor that already started and returns the error.
//! - **Shutdown** always completes. Ordinary actors stop first, so their final
//!   log and error output still has a live sink; the log sink stops last.

pub mod config;
pub mod director;
pub mod signal;
pub mod tracing;

pub use config::DirectorConfig;
pub use director::{ActorRef, Destinations, Director, DirectorHandle, Endpoint, LOG_SLOT};
pub use signal::shutdown_signal;
pub use self::tracing::setup_tracing;
