//! # Observability & Tracing
//!
//! [`setup_tracing`] installs the process-wide `tracing` subscriber used by the
//! runtime and by every actor's [`Logger`](crate::logger::Logger).
//!
//! ## Configuration
//!
//! The compact format hides the crate/module prefix (`with_target(false)`);
//! the structured fields (`actor`, `origin`, `id`) already say where a line
//! came from. Verbosity is controlled by `RUST_LOG`:
//!
//! ```bash
//! # Lifecycle and in-graph log records
//! RUST_LOG=info cargo run -p actorflow-demo
//!
//! # Per-event traffic, state transitions and join progress
//! RUST_LOG=debug cargo run -p actorflow-demo
//! ```
//!
//! ## What Gets Traced
//!
//! - **Actor lifecycle**: `Actor started`, state changes, `Actor stopped`
//! - **Log records**: rendered by the log sink with the originating actor and
//!   the `meta_id` of the event they concern
//! - **Failures**: consume errors, panics, rejected inputs and dropped events
//!
//! With `RUST_LOG=info` a short pipeline looks like:
//!
//! ```text
//! INFO Actor started actor="enrich" loops=1
//! INFO Actor started actor="join" loops=2
//! WARN Rejected ticket actor="enrich" id=Some("9b1c...") time=2026-01-05 10:11:12,013
//! INFO Actor stopped actor="join"
//! ```

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`.
///
/// Call once, at the top of `main`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
