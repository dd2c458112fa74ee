//! AI client trait and provider selection.

pub mod claude;
pub mod error;
pub mod openai;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use crate::config::Secrets;

pub use claude::ClaudeAiClient;
pub use error::AiError;
pub use openai::OpenAiAiClient;

/// HTTP request timeout for AI API calls.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Output token ceiling for one generation request.
pub(crate) const MAX_OUTPUT_TOKENS: u32 = 4096;

/// Environment key overriding the model.
pub const MODEL_ENV: &str = "SHIPNOTE_MODEL";
/// Environment key overriding the OpenAI-compatible base URL.
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";

const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// Metadata about an AI client implementation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AiClientMetadata {
    /// Service provider name.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Maximum token response length requested.
    pub max_response_length: u32,
}

/// Trait for AI service clients.
pub trait AiClient: Send + Sync {
    /// Sends a request to the AI service and returns the raw response text.
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AiError>> + Send + 'a>>;

    /// Returns metadata about the AI client implementation.
    fn get_metadata(&self) -> AiClientMetadata;
}

/// Builds an HTTP client with the standard request timeout.
pub(crate) fn build_http_client() -> Result<Client, AiError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| AiError::HttpClient(e.to_string()))
}

/// Checks an HTTP response for error status.
pub(crate) async fn check_error_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, AiError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response.text().await.unwrap_or_else(|e| {
        debug!("Failed to read error response body: {e}");
        String::new()
    });
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(AiError::RateLimitExceeded);
    }
    Err(AiError::ApiRequestFailed(format!("HTTP {status}: {error_text}")))
}

/// Logs successful text extraction from an AI API response.
pub(crate) fn log_response_success(provider: &str, result: &Result<String, AiError>) {
    if let Ok(text) = result {
        debug!(
            response_len = text.len(),
            "Successfully extracted text content from {} API response", provider
        );
    }
}

/// Picks a provider from the available keys, Anthropic first.
///
/// The model comes from `SHIPNOTE_MODEL` when set, otherwise the provider
/// default.
pub fn client_from_secrets(secrets: &Secrets) -> Result<Box<dyn AiClient>, AiError> {
    let model = secrets.get(MODEL_ENV);

    if let Some(api_key) = secrets.get("ANTHROPIC_API_KEY") {
        let model = model.unwrap_or_else(|| DEFAULT_CLAUDE_MODEL.to_string());
        info!(provider = "Anthropic", model = %model, "Using AI provider");
        return Ok(Box::new(ClaudeAiClient::new(model, api_key)?));
    }

    if let Some(api_key) = secrets.get("OPENAI_API_KEY") {
        let model = model.unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        let base_url = secrets
            .get(OPENAI_BASE_URL_ENV)
            .unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_string());
        info!(provider = "OpenAI", model = %model, base_url = %base_url, "Using AI provider");
        return Ok(Box::new(OpenAiAiClient::new(model, api_key, base_url)?));
    }

    Err(AiError::ApiKeyNotFound)
}
