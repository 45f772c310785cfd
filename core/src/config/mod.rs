//! Configuration data types for switchboard core
//!
//! Only exports pure data types. All loading logic is in the CLI layer.

pub mod types;

pub use types::{
    ArgumentCase, ModelParams, Protocol, ProviderSettings, SwitchboardConfig, ToolsConfig,
};
