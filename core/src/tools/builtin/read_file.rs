//! File reading tool, confined to a workspace root

use super::truncate_output;
use crate::error::ToolError;
use crate::tools::{Tool, ToolCall, ToolExample};
use async_trait::async_trait;
use serde_json::json;
use std::path::{Component, Path, PathBuf};

/// Reads a text file below the configured workspace root
pub struct ReadFileTool {
    root: PathBuf,
    max_bytes: usize,
}

impl ReadFileTool {
    pub fn new(root: PathBuf, max_bytes: usize) -> Self {
        Self { root, max_bytes }
    }

    /// Resolve `filename` under the root, refusing anything that escapes it
    fn resolve(&self, filename: &str) -> Result<PathBuf, ToolError> {
        let relative = Path::new(filename);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if filename.trim().is_empty() || escapes {
            return Err(ToolError::InvalidParameters {
                message: format!("filename must be a relative path inside the workspace: {}", filename),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a UTF-8 text file from the workspace and return its contents."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "Path of the file, relative to the workspace root"
                }
            },
            "required": ["filename"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let filename: String = call.get_parameter("filename")?;
        let path = self.resolve(&filename)?;

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: self.name().to_string(),
                message: format!("{}: {}", filename, e),
            })?;

        let text = String::from_utf8_lossy(&bytes);
        Ok(truncate_output(&text, self.max_bytes))
    }

    fn examples(&self) -> Vec<ToolExample> {
        vec![ToolExample {
            description: "Read a notes file".to_string(),
            arguments: json!({"filename": "notes.txt"}),
            expected_result: "The file's text".to_string(),
        }]
    }
}
