//! Error types for multimodal-agent

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while uploading media or querying the model
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{label} file not found at {}", path.display())]
    FileNotFound { label: String, path: PathBuf },

    #[error("{label} upload failed or timed out.")]
    Upload { label: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Max iterations reached")]
    MaxIterations,

    #[error("Interrupted")]
    Interrupted,

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_not_found_message() {
        let err = Error::FileNotFound {
            label: "Image".to_string(),
            path: PathBuf::from("resources/sample_image.jpg"),
        };
        assert_eq!(
            err.to_string(),
            "Image file not found at resources/sample_image.jpg"
        );
    }

    #[test]
    fn test_upload_message() {
        let err = Error::Upload { label: "Video".to_string() };
        assert_eq!(err.to_string(), "Video upload failed or timed out.");
    }
}
