//! AI client errors.

use thiserror::Error;

/// Errors talking to a generation provider.
#[derive(Error, Debug)]
pub enum AiError {
    /// No provider key is configured.
    #[error("AI API key not found. Set ANTHROPIC_API_KEY or OPENAI_API_KEY")]
    ApiKeyNotFound,

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    /// The API answered with a non-success status.
    #[error("AI API request failed: {0}")]
    ApiRequestFailed(String),

    /// The API body did not have the expected shape.
    #[error("Invalid response format from AI API: {0}")]
    InvalidResponseFormat(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Please try again later")]
    RateLimitExceeded,

    /// Network connectivity error.
    #[error("Network error: {0}")]
    NetworkError(String),
}
