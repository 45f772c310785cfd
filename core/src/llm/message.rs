//! Conversation and message structures

use crate::tools::{ToolCall, ToolResult};
use serde::{Deserialize, Serialize};

/// Represents a message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Text content of the message
    pub content: String,

    /// Name of the tool that produced this message (tool role only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Id of the tool call this message answers (tool role only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool calls requested by the model (assistant role only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message (instructions)
    System,

    /// User message (human input)
    User,

    /// Assistant message (model response)
    Assistant,

    /// Tool message (tool execution result)
    Tool,
}

impl Message {
    fn with_role<S: Into<String>>(role: MessageRole, content: S) -> Self {
        Self {
            role,
            content: content.into(),
            tool_name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    /// Create a new system message
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    /// Create a new user message
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    /// Create a new assistant message
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }

    /// Create an assistant message that requested tool calls
    pub fn assistant_tool_calls<S: Into<String>>(content: S, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::with_role(MessageRole::Assistant, content)
        }
    }

    /// Create a tool message tagged with the tool's name
    pub fn tool<S: Into<String>>(tool_name: S, content: S) -> Self {
        Self {
            tool_name: Some(tool_name.into()),
            ..Self::with_role(MessageRole::Tool, content)
        }
    }

    /// Create the tool message carrying a tool result, success or error
    pub fn tool_result(result: &ToolResult) -> Self {
        Self {
            tool_name: Some(result.name.clone()),
            tool_call_id: Some(result.tool_call_id.clone()),
            ..Self::with_role(MessageRole::Tool, result.content.clone())
        }
    }

    /// Check if the message carries tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Ordered sequence of messages.
///
/// Appends never reorder existing messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the end
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a message, builder style
    pub fn with(mut self, message: Message) -> Self {
        self.push(message);
        self
    }

    /// Insert a message at the front (used for the system preamble)
    pub fn prepend(&mut self, message: Message) {
        self.messages.insert(0, message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl Extend<Message> for Conversation {
    fn extend<T: IntoIterator<Item = Message>>(&mut self, iter: T) {
        self.messages.extend(iter);
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
