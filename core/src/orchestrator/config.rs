//! Round-trip timing and preamble settings

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for [`ToolCallOrchestrator`](super::ToolCallOrchestrator)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Deadline for each provider `generate` call
    pub generate_timeout_ms: u64,

    /// Deadline for a single tool execution
    pub tool_timeout_ms: u64,

    /// Deadline for the whole tool batch; must exceed `tool_timeout_ms`
    pub tool_batch_timeout_ms: u64,

    /// Text placed ahead of the tool list in the system preamble
    pub system_preamble: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            generate_timeout_ms: 60_000,
            tool_timeout_ms: 20_000,
            tool_batch_timeout_ms: 30_000,
            system_preamble: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn generate_timeout(&self) -> Duration {
        Duration::from_millis(self.generate_timeout_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    pub fn tool_batch_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_batch_timeout_ms)
    }

    /// Set all three deadlines at once
    pub fn with_timeouts(mut self, generate: Duration, tool: Duration, batch: Duration) -> Self {
        self.generate_timeout_ms = generate.as_millis() as u64;
        self.tool_timeout_ms = tool.as_millis() as u64;
        self.tool_batch_timeout_ms = batch.as_millis() as u64;
        self
    }

    pub fn with_system_preamble<S: Into<String>>(mut self, preamble: S) -> Self {
        self.system_preamble = Some(preamble.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("orchestrator.generate_timeout_ms", self.generate_timeout_ms),
            ("orchestrator.tool_timeout_ms", self.tool_timeout_ms),
            ("orchestrator.tool_batch_timeout_ms", self.tool_batch_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: "0".to_string(),
                });
            }
        }

        if self.tool_timeout_ms >= self.tool_batch_timeout_ms {
            return Err(ConfigError::InvalidValue {
                field: "orchestrator.tool_timeout_ms".to_string(),
                value: format!(
                    "{} (must be below tool_batch_timeout_ms = {})",
                    self.tool_timeout_ms, self.tool_batch_timeout_ms
                ),
            });
        }

        Ok(())
    }
}
