//! Turn states and outcomes

use crate::error::Error;
use crate::llm::{Conversation, Usage};
use crate::tools::{ToolCall, ToolResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where a turn is in the two-phase round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    AwaitInitial,
    ModelResponded,
    ExecutingTools,
    AwaitFollowup,
    Done,
    Failed,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::AwaitInitial => "await_initial",
            TurnState::ModelResponded => "model_responded",
            TurnState::ExecutingTools => "executing_tools",
            TurnState::AwaitFollowup => "await_followup",
            TurnState::Done => "done",
            TurnState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done | TurnState::Failed)
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A completed turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// The answer for the caller
    pub final_text: String,

    /// Caller's messages followed by everything this turn appended
    pub conversation: Conversation,

    /// Tool results in original call order
    pub tool_results: Vec<ToolResult>,

    /// Number of `generate` calls made (1 or 2)
    pub provider_calls: usize,

    /// Visited states, first to last
    pub states: Vec<TurnState>,

    /// Token usage summed over both calls
    pub usage: Usage,

    /// Tool calls the follow-up response asked for and which were not run
    pub ignored_tool_calls: Vec<ToolCall>,
}

/// A turn that ended in `Failed`
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct TurnFailure {
    /// The underlying error, unmodified
    pub error: Error,

    /// Visited states, ending in `Failed`
    pub states: Vec<TurnState>,

    /// Number of `generate` calls attempted
    pub provider_calls: usize,
}

impl From<TurnFailure> for Error {
    fn from(failure: TurnFailure) -> Self {
        failure.error
    }
}

/// Running record of a turn
#[derive(Debug, Default)]
pub(crate) struct TurnTrace {
    pub states: Vec<TurnState>,
    pub provider_calls: usize,
    pub usage: Usage,
}

impl TurnTrace {
    pub fn enter(&mut self, state: TurnState) {
        debug!(state = %state, "Turn state");
        self.states.push(state);
    }

    pub fn fail(mut self, error: Error) -> TurnFailure {
        if self.states.last() != Some(&TurnState::Failed) {
            self.enter(TurnState::Failed);
        }
        TurnFailure {
            error,
            states: self.states,
            provider_calls: self.provider_calls,
        }
    }
}
