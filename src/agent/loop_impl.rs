//! Agent loop - model calls interleaved with tool execution

use std::io::Write;

use futures_util::StreamExt;
use tracing::{debug, info};

use crate::Result;
use crate::error::Error;
use crate::ui;
use super::llm::{LlmClient, LlmResponse, Usage};
use super::message::{Message, Response, ToolCallRequest};
use super::context::Context;

/// The agent loop processes a query through the LLM and tool execution
pub struct AgentLoop<C: LlmClient> {
    client: C,
    max_iterations: usize,
    stream: bool,
}

impl<C: LlmClient> AgentLoop<C> {
    /// Create a new agent loop
    pub fn new(client: C, max_iterations: usize) -> Self {
        Self {
            client,
            max_iterations,
            stream: true,
        }
    }

    /// Toggle streaming of response text
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Run the agent for a single user message, writing answer text to `out`
    pub async fn run<W: Write>(&self, message: Message, ctx: &Context, out: &mut W) -> Result<Response> {
        info!(
            "Starting agent loop on {}: {} chars, {} attachments",
            self.client.default_model(),
            message.text().len(),
            message.attachment_count()
        );
        let mut messages = ctx.build_messages(message);
        let tools = ctx.tool_runner.definitions();
        let mut usage = Usage::default();
        let mut executed = Vec::new();

        for iteration in 0..self.max_iterations {
            debug!("Iteration {}/{}", iteration + 1, self.max_iterations);

            let response = if self.stream {
                self.stream_turn(&messages, &tools, out).await?
            } else {
                let response = self.client.chat(&messages, &tools).await?;
                if let Some(text) = &response.content {
                    out.write_all(text.as_bytes())?;
                    out.flush()?;
                }
                response
            };
            usage.add(response.usage);

            if !response.has_tool_calls() {
                let content = response.content.unwrap_or_default();
                info!("Agent completed with response: {} chars", content.len());
                writeln!(out)?;
                return Ok(Response {
                    content,
                    usage,
                    tool_calls: executed,
                });
            }

            messages.push(Message::assistant_with_tools(
                response.content.unwrap_or_default(),
                response.tool_calls.clone(),
            ));

            // one functionResponse turn answers every call of this turn
            let mut results = Vec::with_capacity(response.tool_calls.len());
            for tool_call in &response.tool_calls {
                let result = self.execute_tool(ctx, tool_call).await;
                results.push((tool_call.name.clone(), result));
            }
            messages.push(Message::tool_results(results));
            executed.extend(response.tool_calls);
        }

        Err(Error::MaxIterations)
    }

    /// Consume one streamed turn, echoing text deltas as they arrive
    async fn stream_turn<W: Write>(
        &self,
        messages: &[Message],
        tools: &[crate::tools::ToolDefinition],
        out: &mut W,
    ) -> Result<LlmResponse> {
        let mut stream = self.client.chat_stream(messages, tools).await?;
        let mut turn = LlmResponse::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;

            if let Some(text) = chunk.content {
                out.write_all(text.as_bytes())?;
                out.flush()?;
                turn.content.get_or_insert_with(String::new).push_str(&text);
            }

            for mut call in chunk.tool_calls {
                call.id = format!("tc_{}", turn.tool_calls.len());
                turn.tool_calls.push(call);
            }

            // usage is cumulative across events; keep the latest
            if !chunk.usage.is_empty() {
                turn.usage = chunk.usage;
            }
            if chunk.finish_reason.is_some() {
                turn.finish_reason = chunk.finish_reason;
            }
        }

        Ok(turn)
    }

    async fn execute_tool(&self, ctx: &Context, tool_call: &ToolCallRequest) -> String {
        debug!("Executing tool: {} with args: {}", tool_call.name, tool_call.arguments);
        ui::print_tool_call(&tool_call.name, &tool_call.arguments.to_string());

        match ctx.tool_runner.execute(&tool_call.name, tool_call.arguments.clone()).await {
            Ok(result) => {
                debug!("Tool {} succeeded: {} chars", tool_call.name, result.len());
                result
            }
            Err(e) => {
                let error_msg = format!("Error: {}", e);
                debug!("Tool {} failed: {}", tool_call.name, error_msg);
                error_msg
            }
        }
    }
}
