//! Director configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! name = "ingest"
//! queue_size = 1000
//! log_actor_name = "default_log"
//! error_actor_name = "default_error"
//! ```

use crate::error::{FlowError, FlowResult};
use crate::queue::DEFAULT_QUEUE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    /// Name used in the Director's own log lines.
    pub name: String,
    /// Inbound queue capacity for actors registered without an explicit size.
    pub queue_size: usize,
    /// Name of the log sink actor. Reserved.
    pub log_actor_name: String,
    /// Name of the error sink actor. Reserved.
    pub error_actor_name: String,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            name: "director".to_string(),
            queue_size: DEFAULT_QUEUE_SIZE,
            log_actor_name: "default_log".to_string(),
            error_actor_name: "default_error".to_string(),
        }
    }
}

impl DirectorConfig {
    pub fn from_toml_str(source: &str) -> FlowResult<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| FlowError::SetupError(format!("invalid director config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> FlowResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| FlowError::SetupError(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Checks the queue size and that the two sink names differ.
    pub fn validate(&self) -> FlowResult<()> {
        if self.queue_size == 0 {
            return Err(FlowError::SetupError("queue_size must be at least 1".into()));
        }
        if self.log_actor_name == self.error_actor_name {
            return Err(FlowError::SetupError(format!(
                "log and error sinks cannot share the name '{}'",
                self.log_actor_name
            )));
        }
        Ok(())
    }
}
