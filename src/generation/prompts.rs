//! Prompt text for draft generation.

use crate::config::RepoConfig;
use crate::templates::TemplateCatalog;

/// System prompt built from the repository's content policy.
pub fn system_prompt(config: &RepoConfig) -> String {
    let policy = &config.content_policy;
    format!(
        "You are Shipnote, a content generation agent for a developer sharing work publicly on Twitter/X.\n\n\
         Generate tweet-ready drafts from sanitized commit context.\n\n\
         Hard constraints:\n\
         - Hook -> Context -> Value -> Payoff (punchline at end)\n\
         - Single tweets must remain under 280 chars\n\
         - Threads max 7 tweets and first tweet must stand alone\n\
         - Separate thread tweets with a line containing only ---\n\
         - Stay inside focus topics: {}\n\
         - Never include off-topic content: {}\n\
         - Keep tone technical but accessible, direct, and specific.\n",
        policy.focus_topics.join(", "),
        policy.avoid_topics.join(", "),
    )
}

const RETURN_SHAPE: &str = r#"Return shape:
{
  "drafts": [
    {
      "template_type": "authority",
      "content_category": "AI-Curious Builder",
      "suggested_time": "weekday_morning",
      "target_signals": ["dwell_time", "profile_click"],
      "is_thread": false,
      "content": "tweet text"
    }
  ],
  "skip_reason": "optional"
}
"#;

/// User prompt: project identity, context JSON, templates and the expected
/// reply shape.
pub fn user_prompt(
    config: &RepoConfig,
    context_json: &str,
    catalog: &TemplateCatalog,
    max_drafts: usize,
) -> String {
    let templates = catalog
        .templates()
        .iter()
        .map(|t| {
            format!(
                "### Template: {} ({}, content_type: {})\n{}",
                t.filename, t.name, t.content_type, t.body
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "## Project Identity\n\n\
         project_name: {}\n\
         project_description: {}\n\
         voice_description: {}\n\n\
         ## Context\n\n\
         {context_json}\n\n\
         ## Available Templates\n\n\
         {templates}\n\n\
         ## Instructions\n\n\
         Select 1-{max_drafts} templates when appropriate and return JSON only.\n\
         Use the template's content_type as template_type.\n\n\
         {RETURN_SHAPE}",
        config.project_name, config.project_description, config.voice_description,
    )
}
