//! Draft generation: the seam between the poll cycle and the model.
//!
//! The engine only sees [`DraftGenerator`]. [`AiDraftGenerator`] is the
//! production implementation: it prompts an [`AiClient`], pulls the first
//! JSON object out of the reply and keeps the drafts that pass validation.
//! Invalid entries are dropped silently; a reply without a usable JSON
//! object is an error, which the engine retries.

pub mod draft;
pub mod prompts;

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::ai::{AiClient, AiError};
use crate::config::RepoConfig;
use crate::context::GenerationContext;
use crate::templates::TemplateCatalog;

pub use draft::{Audience, Draft, Signal, SuggestedTime};

/// Generation failures. The engine retries once, then gives up on the commit.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Transport or provider failure.
    #[error("generation request failed: {0}")]
    Request(#[from] AiError),

    /// The reply had no usable JSON object.
    #[error("generation output invalid: {0}")]
    InvalidOutput(String),

    /// The context could not be serialized for the prompt.
    #[error("failed to serialize generation context: {0}")]
    Context(#[from] serde_json::Error),
}

/// Validated result of one generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOutcome {
    /// Accepted drafts, at most the requested maximum.
    pub drafts: Vec<Draft>,
    /// Why the model chose not to draft, if it said.
    pub skip_reason: String,
}

/// Turns a generation context into candidate drafts.
pub trait DraftGenerator: Send + Sync {
    /// Generates up to `max_drafts` drafts for one commit.
    fn generate<'a>(
        &'a self,
        context: &'a GenerationContext,
        templates: &'a TemplateCatalog,
        max_drafts: usize,
    ) -> Pin<Box<dyn Future<Output = Result<GenerationOutcome, GenerationError>> + Send + 'a>>;
}

/// Generator backed by an HTTP AI client.
pub struct AiDraftGenerator {
    client: Box<dyn AiClient>,
    config: RepoConfig,
}

impl AiDraftGenerator {
    /// Creates a generator that prompts `client` with `config`'s identity and policy.
    pub fn new(client: Box<dyn AiClient>, config: RepoConfig) -> Self {
        Self { client, config }
    }
}

impl DraftGenerator for AiDraftGenerator {
    fn generate<'a>(
        &'a self,
        context: &'a GenerationContext,
        templates: &'a TemplateCatalog,
        max_drafts: usize,
    ) -> Pin<Box<dyn Future<Output = Result<GenerationOutcome, GenerationError>> + Send + 'a>> {
        Box::pin(async move {
            if max_drafts == 0 {
                return Ok(GenerationOutcome {
                    drafts: Vec::new(),
                    skip_reason: "max_drafts must be >= 1".to_string(),
                });
            }

            let system = prompts::system_prompt(&self.config);
            let user = prompts::user_prompt(&self.config, &context.to_json()?, templates, max_drafts);

            let metadata = self.client.get_metadata();
            debug!(
                provider = %metadata.provider,
                model = %metadata.model,
                prompt_len = user.len(),
                "Requesting drafts"
            );

            let raw = self.client.send_request(&system, &user).await?;
            parse_outcome(&raw, max_drafts)
        })
    }
}

/// Finds the first JSON object in model output: a fenced code block if one
/// exists, otherwise the first balanced `{...}` span.
pub fn extract_json_object(text: &str) -> Result<&str, GenerationError> {
    if let Some(open) = text.find("```") {
        let after = &text[open + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(close) = after.find("```") {
            return Ok(after[..close].trim());
        }
    }

    let start = text
        .find('{')
        .ok_or_else(|| GenerationError::InvalidOutput("no JSON object in model output".into()))?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    Err(GenerationError::InvalidOutput(
        "no complete JSON object in model output".into(),
    ))
}

/// Parses and validates a raw model reply.
pub fn parse_outcome(raw: &str, max_drafts: usize) -> Result<GenerationOutcome, GenerationError> {
    let json = extract_json_object(raw)?;
    let payload: Value = serde_json::from_str(json)
        .map_err(|e| GenerationError::InvalidOutput(format!("malformed JSON: {e}")))?;
    let payload = payload
        .as_object()
        .ok_or_else(|| GenerationError::InvalidOutput("output root must be an object".into()))?;

    let drafts = match payload.get("drafts") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .take(max_drafts)
            .filter_map(Draft::from_value)
            .collect(),
        Some(_) => {
            return Err(GenerationError::InvalidOutput("`drafts` must be a list".into()));
        }
    };

    let skip_reason = match payload.get("skip_reason") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    };

    Ok(GenerationOutcome {
        drafts,
        skip_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_catalog, sample_config, sample_context, ConfigurableMockAiClient};

    const DRAFT: &str = r#"{"template_type": "authority", "content_category": "cross-group",
        "suggested_time": "weekday_evening", "target_signals": ["reply", "repost"],
        "is_thread": false, "content": "Retries {done}."}"#;

    #[test]
    fn extracts_fenced_block_first() {
        let text = "Sure!\n```json\n{\"drafts\": []}\n```\ntrailing {junk}";
        assert_eq!(extract_json_object(text).unwrap(), "{\"drafts\": []}");
    }

    #[test]
    fn extracts_balanced_braces_ignoring_strings() {
        let text = r#"Here: {"a": "brace } in \" string", "b": {"c": 1}} and more"#;
        assert_eq!(
            extract_json_object(text).unwrap(),
            r#"{"a": "brace } in \" string", "b": {"c": 1}}"#
        );
    }

    #[test]
    fn missing_or_unclosed_object_is_invalid() {
        assert!(matches!(
            extract_json_object("no json here"),
            Err(GenerationError::InvalidOutput(_))
        ));
        assert!(extract_json_object("{\"a\": 1").is_err());
    }

    #[test]
    fn parse_caps_drafts_and_keeps_skip_reason() {
        let raw = format!("{{\"drafts\": [{DRAFT}, {DRAFT}, {DRAFT}], \"skip_reason\": \"  none \"}}");
        let outcome = parse_outcome(&raw, 2).unwrap();
        assert_eq!(outcome.drafts.len(), 2);
        assert_eq!(outcome.drafts[0].content, "Retries {done}.");
        assert_eq!(outcome.skip_reason, "none");
    }

    #[test]
    fn parse_rejects_non_object_and_non_list() {
        assert!(parse_outcome("```json\n[1, 2]\n```", 3).is_err());
        assert!(parse_outcome("{\"drafts\": \"nope\"}", 3).is_err());
        assert!(matches!(
            parse_outcome("{\"drafts\": null, \"skip_reason\": \"\"}", 3),
            Err(GenerationError::InvalidOutput(_))
        ));
        let outcome = parse_outcome("{\"skip_reason\": \"docs only\"}", 3).unwrap();
        assert!(outcome.drafts.is_empty());
        assert_eq!(outcome.skip_reason, "docs only");
    }

    #[tokio::test]
    async fn ai_generator_prompts_client_and_validates_reply() {
        let client = ConfigurableMockAiClient::new(vec![Ok(format!(
            "```json\n{{\"drafts\": [{DRAFT}]}}\n```"
        ))]);
        let prompts = client.prompt_handle();
        let generator = AiDraftGenerator::new(Box::new(client), sample_config());

        let outcome = generator
            .generate(&sample_context(), &sample_catalog(), 3)
            .await
            .unwrap();
        assert_eq!(outcome.drafts.len(), 1);

        let recorded = prompts.prompts();
        assert_eq!(recorded.len(), 1);
        let (system, user) = &recorded[0];
        assert!(system.contains("Never include off-topic content: politics, sports, crypto"));
        assert!(user.contains("project_name: Acme"));
        assert!(user.contains("### Template: authority.md"));
        assert!(user.contains("Select 1-3 templates"));
    }

    #[tokio::test]
    async fn ai_generator_surfaces_client_errors() {
        let client = ConfigurableMockAiClient::new(vec![Err(AiError::RateLimitExceeded)]);
        let generator = AiDraftGenerator::new(Box::new(client), sample_config());
        let err = generator
            .generate(&sample_context(), &sample_catalog(), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Request(AiError::RateLimitExceeded)));
    }

    #[tokio::test]
    async fn ai_generator_rejects_null_drafts() {
        let client = ConfigurableMockAiClient::new(vec![Ok("{\"drafts\": null}".to_string())]);
        let generator = AiDraftGenerator::new(Box::new(client), sample_config());
        let err = generator
            .generate(&sample_context(), &sample_catalog(), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::InvalidOutput(_)));
    }
}
