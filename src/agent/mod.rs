//! Agent module — core agent logic.
//!
//! This module contains:
//! - Message types (Message, Part, Response)
//! - LLM client trait and the Gemini implementation
//! - Agent loop for streaming answers and running tool calls
//! - Context builder for prompts

mod context;
mod loop_impl;
mod message;

// LLM providers in submodule
pub mod llm;

// Re-exports for convenience
pub use context::Context;
pub use llm::{GeminiClient, LlmClient, LlmResponse, LlmStream, Usage};
pub use loop_impl::AgentLoop;
pub use message::{Message, Part, Response, Role, ToolCallRequest};
