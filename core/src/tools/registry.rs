//! Tool registry for managing available tools

use crate::error::ToolError;
use crate::llm::ToolDefinition;
use crate::tools::Tool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A named set of tools contributed to the registry at start of day
pub trait ToolSource: Send + Sync {
    /// Name of the source, used in collision logs
    fn source_name(&self) -> &str;

    /// Tools in the order they should be registered
    fn tools(&self) -> Vec<Arc<dyn Tool>>;
}

/// Insertion-ordered registry of uniquely named tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name. Never overwrites.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::NameConflict { name });
        }

        debug!(tool = %name, "Registering tool");
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Register a tool, builder style
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Result<Self, ToolError> {
        self.register(tool)?;
        Ok(self)
    }

    /// Look up a tool by name
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.get(name).cloned().ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
        })
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All tools in insertion order
    pub fn list(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// Tool names in insertion order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get tool name and description
    pub fn get_tool_info(&self, name: &str) -> Option<(&str, &str)> {
        self.get(name).map(|tool| (tool.name(), tool.description()))
    }

    /// Provider-neutral schema list, in insertion order
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    /// Compose registries in order. On a name collision the earliest
    /// registration is kept and the later one is dropped with a warning.
    pub fn merge<I>(registries: I) -> Self
    where
        I: IntoIterator<Item = ToolRegistry>,
    {
        let mut merged = ToolRegistry::new();
        for registry in registries {
            for tool in registry.tools {
                merged.register_or_skip(tool, "merge");
            }
        }
        merged
    }

    /// Build a registry from several sources, earliest source winning collisions
    pub fn from_sources(sources: &[&dyn ToolSource]) -> Self {
        let mut registry = ToolRegistry::new();
        for source in sources {
            for tool in source.tools() {
                registry.register_or_skip(tool, source.source_name());
            }
        }
        registry
    }

    fn register_or_skip(&mut self, tool: Arc<dyn Tool>, source: &str) {
        if let Err(ToolError::NameConflict { name }) = self.register(tool) {
            warn!(
                tool = %name,
                source = %source,
                "Tool name collision; keeping the earliest registration"
            );
        }
    }
}

impl ToolSource for ToolRegistry {
    fn source_name(&self) -> &str {
        "registry"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.clone()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
