#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # actorflow
//!
//! > **A message-flow runtime: actors wired into a graph by bounded queues.**
//!
//! Independent processing stages ("actors") are connected through bounded
//! queues, and events flow through the resulting graph, being transformed,
//! routed, joined, or dropped into error and log side channels at each stage.
//! A failure in one stage never corrupts or halts the pipeline.
//!
//! ## 🏗️ Design Philosophy
//!
//! - **Backpressure is the only flow control.** A full queue suspends its
//!   producer; nothing is buffered beyond a queue's capacity.
//! - **Faults stay with their event.** An error or panic while consuming one
//!   event is logged and contained; the loop moves on.
//! - **Explicit wiring wins.** The Director fills in error and log routing
//!   only where the graph does not already say something.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Data ([`event`])
//! The [`Event`] envelope, its closed set of [`EventKind`]s, payload
//! conversion tables and the fault → HTTP status table.
//!
//! ### 2. The Plumbing ([`queue`], [`logger`])
//! [`Queue`] and [`QueuePool`] materialize the topology; every actor's
//! [`Logger`] fans log events into its log partition.
//!
//! ### 3. The Engine ([`actor`])
//! The [`Actor`] trait and the runtime that drives it: one consumption loop
//! per inbound queue, input validation, failure containment.
//!
//! ### 4. The Orchestrator ([`lifecycle`])
//! [`Director`] registers actors, wires them, attaches the default sinks and
//! drives coordinated start and stop.
//!
//! ### 5. Built-in Actors ([`join`], [`sinks`])
//! [`EventJoin`] reassembles fanned-out branches; [`sinks`] holds the default
//! log and error sinks.
//!
//! ### 6. Testing ([`mock`])
//! [`MockSource`](mock::MockSource) and [`MockSink`](mock::MockSink) for
//! driving a graph from tests.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run the demo pipeline with info logs
//! RUST_LOG=info cargo run -p actorflow-demo
//!
//! # Run the tests
//! cargo test --workspace
//! ```

pub mod actor;
pub mod error;
pub mod event;
pub mod join;
pub mod lifecycle;
pub mod logger;
pub mod mock;
pub mod queue;
pub mod sinks;

pub use actor::{Actor, ActorContext, ActorState};
pub use error::{FlowError, FlowResult};
pub use event::{DataFormat, Event, EventKind, HttpEnvironment, Payload, XmlElement};
pub use join::{EventJoin, MatchedEvent};
pub use lifecycle::{ActorRef, Director, DirectorConfig, DirectorHandle};
pub use logger::{LogLevel, LogRecord, Logger};
pub use queue::{ConnectPolicy, Queue, QueuePool, DEFAULT_QUEUE_SIZE};
