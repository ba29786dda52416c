//! multimodal-agent - ask Gemini one question about an image, a video and an
//! audio clip, with web search available to the model.
//!
//! The library uploads media through the Gemini Files API, waits for the
//! service to finish processing it, and streams the model's answer.

pub mod agent;
pub mod config;
pub mod error;
pub mod gemini;
pub mod logging;
pub mod media;
pub mod query;
pub mod tools;
pub mod ui;

pub use error::{Error, Result};
