//! # actorflow demo
//!
//! Runs the order enrichment pipeline until Ctrl-C.
//!
//! ```bash
//! RUST_LOG=info cargo run -p actorflow-demo
//!
//! # With a director config
//! ACTORFLOW_CONFIG=director.toml RUST_LOG=debug cargo run -p actorflow-demo
//! ```

use actorflow::lifecycle::setup_tracing;
use actorflow::{Director, DirectorConfig};
use actorflow_demo::{build, Printer};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = match std::env::var("ACTORFLOW_CONFIG") {
        Ok(path) => DirectorConfig::load(&path).map_err(|e| e.to_string())?,
        Err(_) => DirectorConfig::default(),
    };
    info!(director = %config.name, queue_size = config.queue_size, "Building pipeline");

    let mut director = Director::new(config);
    build(&mut director, Duration::from_millis(500), Printer).map_err(|e| e.to_string())?;

    director.run().await.map_err(|e| e.to_string())?;

    info!("Pipeline stopped");
    Ok(())
}
