//! Message types for agent communication

use serde::{Deserialize, Serialize};

use crate::media::{AudioAttachment, RemoteFile};

use super::llm::Usage;

/// Message role in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One piece of message content
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),

    /// Media previously uploaded to the Files API
    File { uri: String, mime_type: String },

    /// Raw media sent with the request
    Inline { mime_type: String, data: Vec<u8> },

    /// Function call requested by the model
    ToolCall(ToolCallRequest),

    /// Result of a function call, keyed by function name
    ToolResult { name: String, content: String },
}

impl From<&RemoteFile> for Part {
    fn from(file: &RemoteFile) -> Self {
        Part::File {
            uri: file.uri.clone(),
            mime_type: file.mime_type.clone(),
        }
    }
}

impl From<&AudioAttachment> for Part {
    fn from(audio: &AudioAttachment) -> Self {
        match audio {
            AudioAttachment::Inline { mime_type, data } => Part::Inline {
                mime_type: mime_type.clone(),
                data: data.clone(),
            },
            AudioAttachment::Uploaded(file) => Part::from(file),
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            parts: vec![Part::Text(content.into())],
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(content.into())],
        }
    }

    /// Append a part, builder style
    pub fn with_part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Create an assistant message with tool calls
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        let content = content.into();
        let mut parts = Vec::with_capacity(tool_calls.len() + 1);
        if !content.is_empty() {
            parts.push(Part::Text(content));
        }
        parts.extend(tool_calls.into_iter().map(Part::ToolCall));

        Self {
            role: Role::Assistant,
            parts,
        }
    }

    /// Create a tool result message
    pub fn tool_result(name: impl Into<String>, result: impl Into<String>) -> Self {
        Self::tool_results(vec![(name.into(), result.into())])
    }

    /// Results of every call from one model turn, answered together
    pub fn tool_results(results: Vec<(String, String)>) -> Self {
        Self {
            role: Role::Tool,
            parts: results
                .into_iter()
                .map(|(name, content)| Part::ToolResult { name, content })
                .collect(),
        }
    }

    /// Concatenated text parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Number of non-text attachments
    pub fn attachment_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, Part::File { .. } | Part::Inline { .. }))
            .count()
    }
}

/// A tool call request from the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Final answer from the agent
#[derive(Debug, Clone)]
pub struct Response {
    pub content: String,
    pub usage: Usage,
    /// Tool calls executed on the way to the answer
    pub tool_calls: Vec<ToolCallRequest>,
}
