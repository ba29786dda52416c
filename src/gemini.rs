//! Shared plumbing for talking to the Gemini REST API.

use serde::Deserialize;

use crate::error::Error;
use crate::Result;

/// Root of the Generative Language API.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Error envelope returned by the API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Turn a non-success response into [`Error::Api`], passing successes through.
pub async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await?;
    Err(Error::Api {
        status: status.as_u16(),
        message: api_error_message(&body),
    })
}

/// Extract the human readable message from an error body, or return it raw.
pub fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(status) => format!("{status}: {}", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_message_structured() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(api_error_message(body), "INVALID_ARGUMENT: API key not valid.");
    }

    #[test]
    fn test_api_error_message_raw() {
        assert_eq!(api_error_message(" upstream timeout \n"), "upstream timeout");
    }
}
