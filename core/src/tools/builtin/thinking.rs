//! Sequential thinking tool

use crate::error::ToolError;
use crate::tools::{Tool, ToolCall, ToolExample};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Data structure for a single thought
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtData {
    pub thought: String,
    pub thought_number: u32,
    pub total_thoughts: u32,
    pub next_thought_needed: bool,
    pub is_revision: Option<bool>,
    pub revises_thought: Option<u32>,
    pub branch_from_thought: Option<u32>,
    pub branch_id: Option<String>,
    pub needs_more_thoughts: Option<bool>,
}

/// Tool for structured, multi-step reasoning.
///
/// Stateless: the model carries the chain of thoughts in its own arguments,
/// so the same instance can serve concurrent conversations.
pub struct ThinkingTool;

impl ThinkingTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ThinkingTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ThinkingTool {
    fn name(&self) -> &str {
        "sequentialthinking"
    }

    fn description(&self) -> &str {
        "A tool for dynamic and reflective problem-solving through numbered thoughts.\n\
         Each thought can build on, question, or revise previous insights.\n\
         \n\
         When to use this tool:\n\
         - Breaking down complex problems into steps\n\
         - Analysis that might need course correction\n\
         - Problems where the full scope might not be clear initially\n\
         \n\
         You can adjust total_thoughts as you progress, revise an earlier thought with \
         is_revision/revises_thought, or branch with branch_from_thought/branch_id. \
         Only set next_thought_needed to false when a satisfactory answer is reached."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "thought": {
                    "type": "string",
                    "description": "Your current thinking step"
                },
                "next_thought_needed": {
                    "type": "boolean",
                    "description": "Whether another thought step is needed"
                },
                "thought_number": {
                    "type": "integer",
                    "description": "Current thought number. Minimum value is 1.",
                    "minimum": 1
                },
                "total_thoughts": {
                    "type": "integer",
                    "description": "Estimated total thoughts needed. Minimum value is 1.",
                    "minimum": 1
                },
                "is_revision": {
                    "type": "boolean",
                    "description": "Whether this revises previous thinking"
                },
                "revises_thought": {
                    "type": "integer",
                    "description": "Which thought is being reconsidered",
                    "minimum": 1
                },
                "branch_from_thought": {
                    "type": "integer",
                    "description": "Branching point thought number",
                    "minimum": 1
                },
                "branch_id": {
                    "type": "string",
                    "description": "Branch identifier"
                },
                "needs_more_thoughts": {
                    "type": "boolean",
                    "description": "If more thoughts are needed"
                }
            },
            "required": ["thought", "next_thought_needed", "thought_number", "total_thoughts"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let thought_data = self.validate_and_process_thought(call)?;
        let status = self.create_response_data(&thought_data);

        Ok(format!(
            "Sequential thinking step completed.\n\nThought: {}\n\nStatus:\n{}",
            thought_data.thought,
            serde_json::to_string_pretty(&status).unwrap_or_default()
        ))
    }

    fn examples(&self) -> Vec<ToolExample> {
        vec![
            ToolExample {
                description: "Start a thinking process".to_string(),
                arguments: json!({
                    "thought": "Let me break the question into parts first.",
                    "thought_number": 1,
                    "total_thoughts": 3,
                    "next_thought_needed": true
                }),
                expected_result: "Thinking step recorded with status".to_string(),
            },
            ToolExample {
                description: "Revise a previous thought".to_string(),
                arguments: json!({
                    "thought": "My second step missed an edge case.",
                    "thought_number": 3,
                    "total_thoughts": 4,
                    "next_thought_needed": true,
                    "is_revision": true,
                    "revises_thought": 2
                }),
                expected_result: "Revision recorded with updated thinking".to_string(),
            },
        ]
    }
}

impl ThinkingTool {
    /// Validate input arguments and create ThoughtData
    fn validate_and_process_thought(&self, call: &ToolCall) -> Result<ThoughtData, ToolError> {
        let thought: String = call.get_parameter("thought")?;
        let thought_number: u32 = call.get_parameter("thought_number")?;
        let total_thoughts: u32 = call.get_parameter("total_thoughts")?;
        let next_thought_needed: bool = call.get_parameter("next_thought_needed")?;

        if thought.trim().is_empty() {
            return Err(ToolError::InvalidParameters {
                message: "thought must not be empty".to_string(),
            });
        }

        if thought_number < 1 || total_thoughts < 1 {
            return Err(ToolError::InvalidParameters {
                message: "thought_number and total_thoughts must be at least 1".to_string(),
            });
        }

        let revises_thought: Option<u32> = call.get_optional_parameter("revises_thought")?;
        let branch_from_thought: Option<u32> =
            call.get_optional_parameter("branch_from_thought")?;

        if revises_thought == Some(0) || branch_from_thought == Some(0) {
            return Err(ToolError::InvalidParameters {
                message: "revises_thought and branch_from_thought must be positive".to_string(),
            });
        }

        Ok(ThoughtData {
            thought,
            thought_number,
            // Grow the estimate when the model runs past it
            total_thoughts: total_thoughts.max(thought_number),
            next_thought_needed,
            is_revision: call.get_optional_parameter("is_revision")?,
            revises_thought,
            branch_from_thought,
            branch_id: call.get_optional_parameter("branch_id")?,
            needs_more_thoughts: call.get_optional_parameter("needs_more_thoughts")?,
        })
    }

    /// Create response data for output
    fn create_response_data(&self, thought_data: &ThoughtData) -> serde_json::Value {
        let mut status = json!({
            "thought_number": thought_data.thought_number,
            "total_thoughts": thought_data.total_thoughts,
            "next_thought_needed": thought_data.next_thought_needed,
        });

        if thought_data.is_revision.unwrap_or(false) {
            status["revises_thought"] = json!(thought_data.revises_thought);
        }
        if let (Some(from), Some(branch)) =
            (thought_data.branch_from_thought, &thought_data.branch_id)
        {
            status["branch"] = json!({"id": branch, "from_thought": from});
        }

        status
    }
}
