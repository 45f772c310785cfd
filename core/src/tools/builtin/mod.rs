//! Built-in tools
//!
//! Two sources ship with the crate: the static I/O tools configured by
//! [`ToolsConfig`] and the reasoning tools.

pub mod echo;
pub mod fetch;
pub mod read_file;
pub mod thinking;

pub use echo::EchoTool;
pub use fetch::FetchUrlTool;
pub use read_file::ReadFileTool;
pub use thinking::{ThinkingTool, ThoughtData};

use crate::config::ToolsConfig;
use crate::tools::{Tool, ToolRegistry, ToolSource};
use std::sync::Arc;
use std::time::Duration;

/// Echo, file reading and URL fetching
pub struct StaticTools {
    config: ToolsConfig,
}

impl StaticTools {
    pub fn new(config: ToolsConfig) -> Self {
        Self { config }
    }
}

impl ToolSource for StaticTools {
    fn source_name(&self) -> &str {
        "static"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![
            Arc::new(EchoTool::new()),
            Arc::new(ReadFileTool::new(
                self.config.resolved_workspace_root(),
                self.config.max_output_bytes,
            )),
            Arc::new(FetchUrlTool::new(
                Duration::from_millis(self.config.fetch_timeout_ms),
                self.config.max_output_bytes,
            )),
        ]
    }
}

/// Structured reasoning tools
pub struct ReasoningTools;

impl ToolSource for ReasoningTools {
    fn source_name(&self) -> &str {
        "reasoning"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(ThinkingTool::new())]
    }
}

/// Registry holding the static tools
pub fn static_tools(config: &ToolsConfig) -> ToolRegistry {
    ToolRegistry::from_sources(&[&StaticTools::new(config.clone())])
}

/// Registry holding the reasoning tools
pub fn reasoning_tools() -> ToolRegistry {
    ToolRegistry::from_sources(&[&ReasoningTools])
}

/// Every built-in tool, static tools first
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    ToolRegistry::merge([static_tools(config), reasoning_tools()])
}

/// Cut `output` to at most `max_bytes` bytes on a char boundary, noting
/// how much was dropped.
pub fn truncate_output(output: &str, max_bytes: usize) -> String {
    if output.len() <= max_bytes {
        return output.to_string();
    }

    let mut end = max_bytes;
    while end > 0 && !output.is_char_boundary(end) {
        end -= 1;
    }

    format!(
        "{}\n... [output truncated, {} of {} bytes shown]",
        &output[..end],
        end,
        output.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_order() {
        let registry = default_registry(&ToolsConfig::default());
        assert_eq!(
            registry.names(),
            vec!["echo", "read_file", "fetch_url", "sequentialthinking"]
        );
    }

    #[test]
    fn test_truncate_output_short_is_untouched() {
        assert_eq!(truncate_output("abc", 10), "abc");
    }

    #[test]
    fn test_truncate_output_respects_char_boundary() {
        // 'é' is two bytes; cutting at 1 would split it
        let output = truncate_output("éa", 1);
        assert!(output.starts_with("\n... [output truncated, 0 of 3"));
    }
}
