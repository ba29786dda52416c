//! Gemini LLM client implementation (API key authentication).

use std::collections::VecDeque;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::stream::{BoxStream, Stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::Error;
use crate::gemini::{ensure_success, GEMINI_BASE_URL};
use crate::tools::ToolDefinition;
use crate::Result;

use super::super::message::{Message, Part, Role, ToolCallRequest};
use super::{GeminiResponse, LlmClient, LlmResponse, LlmStream, SseDecoder, Usage};

/// Gemini API client using API key authentication.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_output_tokens: u32,
    client: Client,
}

impl GeminiClient {
    /// Create a new Gemini client with API key.
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
            temperature: 0.7,
            max_output_tokens: 8192,
            client: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn build_url(&self, method: &str) -> String {
        let url = format!(
            "{}/v1beta/models/{}:{}?key={}",
            self.base_url, self.model, method, self.api_key
        );
        if method == "streamGenerateContent" {
            format!("{url}&alt=sse")
        } else {
            url
        }
    }

    fn convert_part(part: &Part) -> Value {
        match part {
            Part::Text(text) => json!({ "text": text }),
            Part::File { uri, mime_type } => json!({
                "fileData": { "mimeType": mime_type, "fileUri": uri }
            }),
            Part::Inline { mime_type, data } => json!({
                "inlineData": { "mimeType": mime_type, "data": STANDARD.encode(data) }
            }),
            Part::ToolCall(tc) => json!({
                "functionCall": { "name": tc.name, "args": tc.arguments }
            }),
            Part::ToolResult { name, content } => json!({
                "functionResponse": { "name": name, "response": { "result": content } }
            }),
        }
    }

    fn convert_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "model",
                    // function responses travel in user turns
                    Role::User | Role::Tool | Role::System => "user",
                };
                let parts: Vec<Value> = m.parts.iter().map(Self::convert_part).collect();
                json!({ "role": role, "parts": parts })
            })
            .collect()
    }

    fn get_system_instruction(messages: &[Message]) -> Option<String> {
        messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.text())
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Option<Value> {
        if tools.is_empty() {
            return None;
        }

        let function_declarations: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters
                })
            })
            .collect();

        Some(json!([{
            "functionDeclarations": function_declarations
        }]))
    }

    fn build_request(&self, messages: &[Message], tools: &[ToolDefinition]) -> Value {
        let mut request = json!({
            "contents": Self::convert_messages(messages),
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens
            }
        });

        if let Some(system) = Self::get_system_instruction(messages) {
            request["systemInstruction"] = json!({
                "parts": [{"text": system}]
            });
        }

        if let Some(tool_config) = Self::convert_tools(tools) {
            request["tools"] = tool_config;
        }

        request
    }
}

/// Convert one response (or stream event) into an [`LlmResponse`].
///
/// Stream events may carry no candidates at all (usage-only trailers), so a
/// missing candidate is only an error when the prompt was blocked.
pub(crate) fn parse_response(response: &GeminiResponse) -> Result<LlmResponse> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(Error::Llm(format!("Prompt blocked: {reason}")));
    }

    let mut content: Option<String> = None;
    let mut tool_calls = Vec::new();
    let mut finish_reason = None;

    if let Some(candidate) = response.candidates.first() {
        finish_reason = candidate.finish_reason.clone();
        let parts = candidate.content.iter().flat_map(|c| c.parts.iter());

        for part in parts {
            if let Some(text) = part.text.as_deref().filter(|_| !part.thought) {
                content.get_or_insert_with(String::new).push_str(text);
            }

            if let Some(ref fc) = part.function_call {
                tool_calls.push(ToolCallRequest {
                    id: format!("tc_{}", tool_calls.len()),
                    name: fc.name.clone(),
                    arguments: fc.args.clone(),
                });
            }
        }
    }

    let usage = response
        .usage_metadata
        .as_ref()
        .map(|u| Usage {
            prompt_tokens: u.prompt_token_count.unwrap_or(0),
            completion_tokens: u.candidates_token_count.unwrap_or(0),
            total_tokens: u.total_token_count.unwrap_or(0),
        })
        .unwrap_or_default();

    Ok(LlmResponse {
        content,
        tool_calls,
        finish_reason,
        usage,
    })
}

fn parse_event(data: &str) -> Result<LlmResponse> {
    let event: GeminiResponse = serde_json::from_str(data)?;
    parse_response(&event)
}

/// Turn a raw SSE body into parsed response deltas.
///
/// A transport error is yielded once and ends the stream. Payloads still
/// buffered when the body ends are flushed.
pub(crate) fn sse_response_stream<S, B, E>(bytes: S) -> LlmStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Send + 'static,
    Error: From<E>,
{
    struct State<B, E> {
        bytes: BoxStream<'static, std::result::Result<B, E>>,
        decoder: SseDecoder,
        pending: VecDeque<String>,
        done: bool,
    }

    let state = State {
        bytes: bytes.boxed(),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(data) = st.pending.pop_front() {
                return Some((parse_event(&data), st));
            }
            if st.done {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = st.decoder.push(chunk.as_ref());
                    st.pending.extend(events);
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(Error::from(e)), st));
                }
                None => {
                    st.done = true;
                    let events = st.decoder.finish();
                    st.pending.extend(events);
                }
            }
        }
    })
    .boxed()
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn chat(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmResponse> {
        let request = self.build_request(messages, tools);
        debug!("generateContent on {} with {} messages", self.model, messages.len());

        let response = self
            .client
            .post(self.build_url("generateContent"))
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let gemini_response: GeminiResponse = response.json().await?;
        if gemini_response.candidates.is_empty() && gemini_response.prompt_feedback.is_none() {
            return Err(Error::Llm("No candidates in response".to_string()));
        }
        parse_response(&gemini_response)
    }

    async fn chat_stream(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmStream> {
        let request = self.build_request(messages, tools);
        debug!("streamGenerateContent on {} with {} messages", self.model, messages.len());

        let response = self
            .client
            .post(self.build_url("streamGenerateContent"))
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        Ok(sse_response_stream(response.bytes_stream()))
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url() {
        let client = GeminiClient::new("k", "gemini-2.0-flash-exp").with_base_url("http://localhost:1/");
        assert_eq!(
            client.build_url("generateContent"),
            "http://localhost:1/v1beta/models/gemini-2.0-flash-exp:generateContent?key=k"
        );
        assert!(client.build_url("streamGenerateContent").ends_with("?key=k&alt=sse"));
    }

    #[test]
    fn test_request_shape() {
        let client = GeminiClient::new("k", "m");
        let messages = vec![
            Message::system("Be brief."),
            Message::user("What is this?")
                .with_part(Part::File {
                    uri: "https://example.invalid/files/img".to_string(),
                    mime_type: "image/jpeg".to_string(),
                })
                .with_part(Part::Inline {
                    mime_type: "audio/mpeg".to_string(),
                    data: b"abc".to_vec(),
                }),
        ];
        let tools = vec![ToolDefinition {
            name: "duckduckgo_search".to_string(),
            description: "search".to_string(),
            parameters: json!({"type": "object"}),
        }];

        let request = client.build_request(&messages, &tools);

        assert_eq!(request["systemInstruction"]["parts"][0]["text"], "Be brief.");
        let contents = request["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        let parts = &contents[0]["parts"];
        assert_eq!(parts[0]["text"], "What is this?");
        assert_eq!(parts[1]["fileData"]["fileUri"], "https://example.invalid/files/img");
        assert_eq!(parts[2]["inlineData"]["data"], "YWJj");
        assert_eq!(
            request["tools"][0]["functionDeclarations"][0]["name"],
            "duckduckgo_search"
        );
    }

    #[test]
    fn test_tool_round_trip_roles() {
        let call = ToolCallRequest {
            id: "tc_0".to_string(),
            name: "duckduckgo_news".to_string(),
            arguments: json!({"query": "x"}),
        };
        let contents = GeminiClient::convert_messages(&[
            Message::assistant_with_tools("", vec![call]),
            Message::tool_result("duckduckgo_news", "results"),
        ]);

        assert_eq!(contents[0]["role"], "model");
        assert_eq!(contents[0]["parts"][0]["functionCall"]["name"], "duckduckgo_news");
        assert_eq!(contents[1]["role"], "user");
        assert_eq!(
            contents[1]["parts"][0]["functionResponse"]["response"]["result"],
            "results"
        );
    }

    #[test]
    fn test_parallel_results_share_one_content() {
        let call = |name: &str| ToolCallRequest {
            id: "tc".to_string(),
            name: name.to_string(),
            arguments: json!({"query": "x"}),
        };
        let contents = GeminiClient::convert_messages(&[
            Message::user("go"),
            Message::assistant_with_tools("", vec![call("duckduckgo_search"), call("duckduckgo_news")]),
            Message::tool_results(vec![
                ("duckduckgo_search".to_string(), "web".to_string()),
                ("duckduckgo_news".to_string(), "news".to_string()),
            ]),
        ]);

        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["parts"].as_array().unwrap().len(), 2);
        let responses = contents[2]["parts"].as_array().unwrap();
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["functionResponse"]["name"], "duckduckgo_search");
        assert_eq!(responses[1]["functionResponse"]["response"]["result"], "news");
    }

    #[tokio::test]
    async fn test_sse_stream_across_split_chunks() {
        let body: Vec<Result<Vec<u8>>> = vec![
            Ok(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"te".to_vec()),
            Ok(b"xt\":\"Hel\"}]}}]}\r\n\r\ndata: {\"candidates\":[{\"content\":".to_vec()),
            Ok(b"{\"parts\":[{\"text\":\"lo\"}]}}]}\n\n".to_vec()),
            // final event without the trailing blank line
            Ok(b"data: {\"usageMetadata\":{\"totalTokenCount\":9}}".to_vec()),
        ];

        let events: Vec<_> = sse_response_stream(futures_util::stream::iter(body)).collect().await;

        assert_eq!(events.len(), 3);
        let events: Vec<LlmResponse> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events[0].content.as_deref(), Some("Hel"));
        assert_eq!(events[1].content.as_deref(), Some("lo"));
        assert_eq!(events[2].usage.total_tokens, 9);
    }

    #[tokio::test]
    async fn test_sse_stream_stops_after_transport_error() {
        let body: Vec<Result<Vec<u8>>> = vec![
            Ok(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"partial\"}]}}]}\n\n".to_vec()),
            Err(Error::Other("connection reset".to_string())),
            Ok(b"data: {\"candidates\":[]}\n\n".to_vec()),
        ];

        let events: Vec<_> = sse_response_stream(futures_util::stream::iter(body)).collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().content.as_deref(), Some("partial"));
        assert!(matches!(&events[1], Err(Error::Other(msg)) if msg == "connection reset"));
    }

    #[tokio::test]
    async fn test_sse_stream_reports_malformed_event() {
        let body: Vec<Result<Vec<u8>>> = vec![Ok(b"data: {not json\n\n".to_vec())];
        let events: Vec<_> = sse_response_stream(futures_util::stream::iter(body)).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(Error::Json(_))));
    }

    #[test]
    fn test_parse_text_and_calls() {
        let event = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking aloud", "thought": true},
                    {"text": "Hello "},
                    {"text": "there"},
                    {"functionCall": {"name": "duckduckgo_search", "args": {"query": "news"}}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3, "totalTokenCount": 15}
        }"#;

        let parsed = parse_event(event).unwrap();
        assert_eq!(parsed.content.as_deref(), Some("Hello there"));
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].arguments["query"], "news");
        assert_eq!(parsed.usage.total_tokens, 15);
        assert_eq!(parsed.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_parse_usage_only_event() {
        let parsed = parse_event(r#"{"usageMetadata": {"totalTokenCount": 7}}"#).unwrap();
        assert!(parsed.content.is_none());
        assert!(!parsed.has_tool_calls());
        assert_eq!(parsed.usage.total_tokens, 7);
    }

    #[test]
    fn test_parse_blocked_prompt() {
        let err = parse_event(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }
}
