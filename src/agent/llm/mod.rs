//! LLM client abstraction layer.
//!
//! This module provides:
//! - [`LlmClient`] trait for swappable LLM providers
//! - [`GeminiClient`], the Gemini API implementation (blocking and SSE streaming)
//! - [`SseDecoder`] for turning a byte stream into server-sent event payloads

mod sse;
mod types;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::tools::ToolDefinition;
use crate::Result;

pub use sse::SseDecoder;
pub use types::*;

pub mod gemini;

pub use gemini::GeminiClient;

use super::message::{Message, ToolCallRequest};

/// Stream of partial responses; text arrives as deltas.
pub type LlmStream = BoxStream<'static, Result<LlmResponse>>;

/// Response from an LLM provider.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    /// Text content of the response.
    pub content: Option<String>,

    /// Tool calls requested by the LLM.
    pub tool_calls: Vec<ToolCallRequest>,

    /// Reason the response finished.
    pub finish_reason: Option<String>,

    /// Token usage statistics.
    pub usage: Usage,
}

impl LlmResponse {
    /// Create a simple text response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            finish_reason: Some("STOP".to_string()),
            ..Default::default()
        }
    }

    /// Check if response has tool calls.
    #[inline]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0 && self.prompt_tokens == 0 && self.completion_tokens == 0
    }

    /// Sum usage across round trips.
    pub fn add(&mut self, other: Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// LLM client trait — swappable provider abstraction.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send messages and get the complete response.
    async fn chat(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmResponse>;

    /// Send messages and stream the response as it is generated.
    async fn chat_stream(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmStream>;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;
}

/// Fake LLM client for testing.
///
/// Each call pops one scripted turn. Streaming splits a turn's text into
/// word-sized deltas.
#[cfg(test)]
pub struct FakeLlmClient {
    responses: std::sync::Mutex<std::collections::VecDeque<LlmResponse>>,
    pub seen: std::sync::Mutex<Vec<Vec<Message>>>,
}

#[cfg(test)]
impl FakeLlmClient {
    /// Create with predefined text responses.
    pub fn new(responses: Vec<&str>) -> Self {
        Self::scripted(responses.iter().map(|s| LlmResponse::text(*s)).collect())
    }

    /// Create from arbitrary scripted turns.
    pub fn scripted(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            seen: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create with a single tool call followed by a text response.
    pub fn with_tool_call(name: &str, args: serde_json::Value, final_response: &str) -> Self {
        let tool_response = LlmResponse {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: "tc_0".to_string(),
                name: name.to_string(),
                arguments: args,
            }],
            finish_reason: Some("STOP".to_string()),
            usage: Usage::default(),
        };

        Self::scripted(vec![tool_response, LlmResponse::text(final_response)])
    }

    fn next(&self, messages: &[Message]) -> Result<LlmResponse> {
        self.seen.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| crate::error::Error::Llm("No more fake responses".to_string()))
    }
}

#[cfg(test)]
#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn chat(&self, messages: &[Message], _tools: &[ToolDefinition]) -> Result<LlmResponse> {
        self.next(messages)
    }

    async fn chat_stream(&self, messages: &[Message], _tools: &[ToolDefinition]) -> Result<LlmStream> {
        let turn = self.next(messages)?;

        let mut chunks: Vec<Result<LlmResponse>> = turn
            .content
            .unwrap_or_default()
            .split_inclusive(' ')
            .map(|word| Ok(LlmResponse { content: Some(word.to_string()), ..Default::default() }))
            .collect();
        chunks.push(Ok(LlmResponse {
            tool_calls: turn.tool_calls,
            finish_reason: turn.finish_reason,
            usage: turn.usage,
            ..Default::default()
        }));

        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }

    fn default_model(&self) -> &str {
        "fake-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_fake_llm_client() {
        let client = FakeLlmClient::new(vec!["Hello!", "World!"]);

        let resp1 = client.chat(&[], &[]).await.unwrap();
        assert_eq!(resp1.content.as_deref(), Some("Hello!"));

        let resp2 = client.chat(&[], &[]).await.unwrap();
        assert_eq!(resp2.content.as_deref(), Some("World!"));

        assert!(client.chat(&[], &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_fake_stream_yields_deltas() {
        let client = FakeLlmClient::new(vec!["one two three"]);
        let chunks: Vec<_> = client.chat_stream(&[], &[]).await.unwrap().collect().await;

        let text: String = chunks
            .into_iter()
            .filter_map(|c| c.unwrap().content)
            .collect();
        assert_eq!(text, "one two three");
    }

    #[test]
    fn test_usage_add() {
        let mut total = Usage::default();
        assert!(total.is_empty());
        total.add(Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 });
        total.add(Usage { prompt_tokens: 20, completion_tokens: 1, total_tokens: 21 });
        assert_eq!(total.total_tokens, 36);
    }
}
