//! Tool system and built-in tools

pub mod base;
pub mod builtin;
pub mod registry;

pub use base::{Tool, ToolCall, ToolExample, ToolResult};
pub use registry::{ToolRegistry, ToolSource};
