//! OpenAI-compatible chat completions client.

use std::future::Future;
use std::pin::Pin;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    build_http_client, check_error_response, log_response_success, AiClient, AiClientMetadata,
    AiError, MAX_OUTPUT_TOKENS,
};

/// Default OpenAI API origin.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

#[derive(Serialize, Debug)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize, Debug)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OpenAiResponse {
    choices: Vec<Choice>,
    model: Option<String>,
}

/// OpenAI-compatible API client.
pub struct OpenAiAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiAiClient {
    /// Creates a client for `base_url`, e.g. `https://api.openai.com`.
    pub fn new(model: String, api_key: String, base_url: String) -> Result<Self, AiError> {
        Ok(Self {
            client: build_http_client()?,
            api_key,
            model,
            base_url,
        })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }

    /// Newer reasoning models take `max_completion_tokens` instead of `max_tokens`.
    fn uses_completion_tokens(&self) -> bool {
        self.model.starts_with("gpt-5") || self.model.starts_with("o1")
    }
}

impl AiClient for OpenAiAiClient {
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AiError>> + Send + 'a>> {
        Box::pin(async move {
            let mut messages = Vec::new();
            if !system_prompt.is_empty() {
                messages.push(Message {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                });
            }
            messages.push(Message {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            });

            let (max_tokens, max_completion_tokens) = if self.uses_completion_tokens() {
                (None, Some(MAX_OUTPUT_TOKENS))
            } else {
                (Some(MAX_OUTPUT_TOKENS), None)
            };
            let request = OpenAiRequest {
                model: self.model.clone(),
                messages,
                max_tokens,
                max_completion_tokens,
                stream: false,
            };

            let url = self.api_url();
            info!(url = %url, model = %self.model, "Sending request to OpenAI-compatible API");

            let response = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await
                .map_err(|e| AiError::NetworkError(e.to_string()))?;

            let response = check_error_response(response).await?;

            let openai_response: OpenAiResponse = response
                .json()
                .await
                .map_err(|e| AiError::InvalidResponseFormat(e.to_string()))?;

            debug!(
                choice_count = openai_response.choices.len(),
                model = ?openai_response.model,
                "Received OpenAI-compatible API response"
            );

            let result = openai_response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| AiError::InvalidResponseFormat("No choices in response".to_string()));

            log_response_success("OpenAI", &result);
            result
        })
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: "OpenAI".to_string(),
            model: self.model.clone(),
            max_response_length: MAX_OUTPUT_TOKENS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn api_url_ignores_trailing_slash() {
        let client =
            OpenAiAiClient::new("gpt-4o".to_string(), "k".to_string(), "http://localhost:8080/".to_string())
                .unwrap();
        assert_eq!(client.api_url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn completion_token_models_are_detected() {
        let new = |model: &str| {
            OpenAiAiClient::new(model.to_string(), "k".to_string(), DEFAULT_BASE_URL.to_string())
                .unwrap()
        };
        assert!(new("gpt-5-mini").uses_completion_tokens());
        assert!(!new("gpt-4o").uses_completion_tokens());
    }

    #[tokio::test]
    async fn posts_chat_completion_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4o", "max_tokens": 4096})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "gpt-4o",
                "choices": [{"message": {"role": "assistant", "content": "hello"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            OpenAiAiClient::new("gpt-4o".to_string(), "sk-test".to_string(), server.uri()).unwrap();
        assert_eq!(client.send_request("sys", "user").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn empty_choices_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client =
            OpenAiAiClient::new("gpt-4o".to_string(), "k".to_string(), server.uri()).unwrap();
        assert!(matches!(
            client.send_request("s", "u").await,
            Err(AiError::InvalidResponseFormat(_))
        ));
    }
}
