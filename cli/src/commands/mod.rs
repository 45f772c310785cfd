//! CLI command implementations

pub mod chat;
pub mod providers;
pub mod tools;

pub use chat::{chat_command, ChatArgs};
pub use providers::providers_command;
pub use tools::tools_command;
