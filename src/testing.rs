//! Shared test doubles: scripted AI client, in-memory commit source and
//! scripted draft generator, plus sample configuration fixtures.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset};

use crate::ai::{AiClient, AiClientMetadata, AiError};
use crate::config::RepoConfig;
use crate::context::{CommitDetails, GenerationContext};
use crate::generation::{
    Audience, Draft, DraftGenerator, GenerationError, GenerationOutcome, Signal, SuggestedTime,
};
use crate::git::{CommitRecord, CommitSource, SourceControlError};
use crate::state::ContentLedger;
use crate::templates::{parse_template, TemplateCatalog, STANDARD_TEMPLATES};

pub(crate) const SAMPLE_CONFIG: &str = r#"
project_name: "Acme"
project_description: "A tool for builders"
voice_description: "Plain, direct"
skip_patterns:
  messages: ["^wip", "^merge"]
  files_only: ["*.lock", "docs/*"]
  min_meaningful_files: 1
content_balance:
  authority: 40
  translation: 30
  personal: 20
  growth: 10
secret_patterns:
  - "sk-[A-Za-z0-9]{20,}"
"#;

/// Sample configuration rooted at `/repo`.
pub(crate) fn sample_config() -> RepoConfig {
    RepoConfig::from_yaml_str(SAMPLE_CONFIG, Path::new("/repo/.shipnote/config.yaml")).unwrap()
}

/// Sample configuration rooted at `root`, with its runtime directories created.
pub(crate) fn config_in(root: &Path) -> RepoConfig {
    let config =
        RepoConfig::from_yaml_str(SAMPLE_CONFIG, &root.join(".shipnote").join("config.yaml"))
            .unwrap();
    config.ensure_runtime_dirs().unwrap();
    config
}

/// Catalog holding every standard template.
pub(crate) fn sample_catalog() -> TemplateCatalog {
    let templates = STANDARD_TEMPLATES
        .iter()
        .map(|name| {
            let raw = format!(
                "---\nname: {name}\ncontent_type: {name}\n---\nWrite a {name} post.\n"
            );
            parse_template(Path::new(&format!("{name}.md")), &raw).unwrap()
        })
        .collect();
    TemplateCatalog::from_templates("/repo/.shipnote/templates", templates)
}

pub(crate) fn commit(id: &str, message: &str) -> CommitRecord {
    CommitRecord {
        id: id.to_string(),
        message: message.to_string(),
        author: "Dev".to_string(),
        date: DateTime::<FixedOffset>::parse_from_rfc3339("2026-10-18T09:30:00+02:00").unwrap(),
    }
}

/// Context for a single commit against an empty ledger.
pub(crate) fn sample_context() -> GenerationContext {
    let config = sample_config();
    GenerationContext::build(
        &config,
        &commit(&"a".repeat(40), "Add retry logic"),
        CommitDetails {
            files_changed: vec!["src/retry.rs".to_string()],
            sanitized_diff: "+fn retry() {}\n".to_string(),
            current_branch: "main".to_string(),
            recent_history: vec!["Add retry logic".to_string()],
        },
        &ContentLedger::new(sample_today()),
    )
}

fn sample_today() -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

pub(crate) fn draft(template_type: &str, content: &str) -> Draft {
    Draft {
        template_type: template_type.to_string(),
        content_category: Audience::CrossGroup,
        suggested_time: SuggestedTime::WeekdayEvening,
        target_signals: vec![Signal::Reply, Signal::Repost],
        is_thread: false,
        content: content.to_string(),
    }
}

/// Mock AI client with a FIFO queue of responses.
///
/// Calls past the end of the queue fail with a request error. Every call
/// records its `(system, user)` prompt pair.
pub(crate) struct ConfigurableMockAiClient {
    responses: Arc<Mutex<VecDeque<Result<String, AiError>>>>,
    recorded_prompts: Arc<Mutex<Vec<(String, String)>>>,
}

impl ConfigurableMockAiClient {
    pub(crate) fn new(responses: Vec<Result<String, AiError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            recorded_prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle for reading prompts after the client has been boxed away.
    pub(crate) fn prompt_handle(&self) -> PromptRecordHandle {
        PromptRecordHandle {
            recorded_prompts: self.recorded_prompts.clone(),
        }
    }
}

pub(crate) struct PromptRecordHandle {
    recorded_prompts: Arc<Mutex<Vec<(String, String)>>>,
}

impl PromptRecordHandle {
    pub(crate) fn prompts(&self) -> Vec<(String, String)> {
        self.recorded_prompts.lock().unwrap().clone()
    }
}

impl AiClient for ConfigurableMockAiClient {
    fn send_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, AiError>> + Send + 'a>> {
        let responses = self.responses.clone();
        let recorded = self.recorded_prompts.clone();
        let sys = system_prompt.to_string();
        let usr = user_prompt.to_string();
        Box::pin(async move {
            recorded.lock().unwrap().push((sys, usr));
            responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AiError::ApiRequestFailed("no more mock responses".into())))
        })
    }

    fn get_metadata(&self) -> AiClientMetadata {
        AiClientMetadata {
            provider: "Mock".to_string(),
            model: "mock-model".to_string(),
            max_response_length: 4096,
        }
    }
}

/// In-memory linear history. Reads can be made to fail per commit.
#[derive(Default)]
pub(crate) struct MemorySource {
    pub(crate) history: Vec<CommitRecord>,
    pub(crate) files: HashMap<String, Vec<String>>,
    pub(crate) diffs: HashMap<String, String>,
    pub(crate) failing_diffs: Vec<String>,
    pub(crate) unavailable: bool,
}

impl MemorySource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(mut self, id: &str, message: &str, files: &[&str]) -> Self {
        self.history.push(commit(id, message));
        self.files
            .insert(id.to_string(), files.iter().map(|f| (*f).to_string()).collect());
        self
    }

    pub(crate) fn with_diff(mut self, id: &str, diff: &str) -> Self {
        self.diffs.insert(id.to_string(), diff.to_string());
        self
    }

    fn unavailable() -> SourceControlError {
        SourceControlError::git("open repository", git2::Error::from_str("gone"))
    }
}

impl CommitSource for MemorySource {
    fn verify(&self) -> Result<(), SourceControlError> {
        if self.unavailable {
            return Err(Self::unavailable());
        }
        Ok(())
    }

    fn head_id(&self) -> Result<Option<String>, SourceControlError> {
        Ok(self.history.last().map(|c| c.id.clone()))
    }

    fn commits_since(&self, cursor: Option<&str>) -> Result<Vec<CommitRecord>, SourceControlError> {
        let Some(cursor) = cursor else {
            return Ok(self.history.last().cloned().into_iter().collect());
        };
        match self.history.iter().position(|c| c.id == cursor) {
            Some(index) => Ok(self.history[index + 1..].to_vec()),
            None => Err(SourceControlError::HistoryRewritten(cursor.to_string())),
        }
    }

    fn changed_files(&self, id: &str) -> Result<Vec<String>, SourceControlError> {
        Ok(self.files.get(id).cloned().unwrap_or_default())
    }

    fn diff(&self, id: &str) -> Result<String, SourceControlError> {
        if self.failing_diffs.iter().any(|f| f == id) {
            return Err(SourceControlError::git(
                format!("diff {id}"),
                git2::Error::from_str("object not found"),
            ));
        }
        Ok(self.diffs.get(id).cloned().unwrap_or_else(|| format!("+change in {id}\n")))
    }

    fn diff_stat(&self, id: &str) -> Result<String, SourceControlError> {
        let count = self.files.get(id).map_or(0, Vec::len);
        Ok(format!(" {count} file(s) changed\n"))
    }

    fn branch_name(&self) -> Result<String, SourceControlError> {
        Ok("main".to_string())
    }

    fn recent_messages(&self, count: usize) -> Result<Vec<String>, SourceControlError> {
        Ok(self
            .history
            .iter()
            .rev()
            .take(count)
            .map(|c| c.message.clone())
            .collect())
    }
}

/// Generator that replays scripted results and records each call's commit.
pub(crate) struct ScriptedGenerator {
    results: Mutex<VecDeque<Result<GenerationOutcome, GenerationError>>>,
    calls: Mutex<Vec<GenerationContext>>,
}

impl ScriptedGenerator {
    pub(crate) fn new(results: Vec<Result<GenerationOutcome, GenerationError>>) -> Self {
        Self {
            results: Mutex::new(VecDeque::from(results)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn drafts(drafts: Vec<Draft>) -> Result<GenerationOutcome, GenerationError> {
        Ok(GenerationOutcome {
            drafts,
            skip_reason: String::new(),
        })
    }

    pub(crate) fn failure(message: &str) -> Result<GenerationOutcome, GenerationError> {
        Err(GenerationError::InvalidOutput(message.to_string()))
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls(&self) -> Vec<GenerationContext> {
        self.calls.lock().unwrap().clone()
    }
}

impl DraftGenerator for ScriptedGenerator {
    fn generate<'a>(
        &'a self,
        context: &'a GenerationContext,
        _templates: &'a TemplateCatalog,
        _max_drafts: usize,
    ) -> Pin<Box<dyn Future<Output = Result<GenerationOutcome, GenerationError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(context.clone());
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(GenerationOutcome::default()))
        })
    }
}
