//! One poll cycle: discover new commits and process each exactly once.
//!
//! The caller holds the runtime lock for the whole cycle. State is persisted
//! at every checkpoint, so a crash between commits loses nothing and a crash
//! mid-commit replays only that commit.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::RepoConfig;
use crate::context::{CommitDetails, GenerationContext};
use crate::filter::SkipRules;
use crate::generation::{DraftGenerator, GenerationOutcome};
use crate::git::{short_id, CommitRecord, CommitSource, SourceControlError};
use crate::queue::{QueueWriter, WriteError};
use crate::redact::redact;
use crate::state::{self, PipelineState, StateError};
use crate::templates::TemplateCatalog;

/// Pause between the first failed generation attempt and the retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Why a cycle stopped early.
#[derive(Error, Debug)]
pub enum CycleFailure {
    /// Commit discovery failed.
    #[error("commit discovery failed: {0}")]
    Discovery(#[source] SourceControlError),

    /// Reading one commit failed.
    #[error("git read failed for commit {commit}: {source}")]
    Source {
        /// Short id of the commit being processed.
        commit: String,
        /// Underlying error.
        source: SourceControlError,
    },

    /// Persisting state failed.
    #[error(transparent)]
    State(#[from] StateError),

    /// Writing queue files failed; the commit will be retried.
    #[error("queue write failed for commit {commit}: {source}")]
    Write {
        /// Short id of the commit being processed.
        commit: String,
        /// Underlying error, with the files already written.
        source: WriteError,
    },
}

/// How a cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// All discovered commits were handled.
    Completed,
    /// The repository could not be opened.
    RepositoryUnavailable(String),
    /// The repository has no commits yet.
    EmptyRepository,
    /// The state file was corrupt; the cursor was reset to HEAD.
    StateRecovered,
    /// The cycle stopped early; remaining commits are retried next cycle.
    Failed(CycleFailure),
}

/// Counters and artifacts from one cycle.
#[derive(Debug)]
pub struct CycleReport {
    /// Commits found after the cursor.
    pub discovered: usize,
    /// Commits newly marked processed.
    pub processed: usize,
    /// Processed commits that passed the filter.
    pub kept: usize,
    /// Processed commits rejected by the filter.
    pub skipped: usize,
    /// Queue files written this cycle.
    pub queued: Vec<PathBuf>,
    /// Terminal state.
    pub outcome: CycleOutcome,
}

impl CycleReport {
    fn new() -> Self {
        Self {
            discovered: 0,
            processed: 0,
            kept: 0,
            skipped: 0,
            queued: Vec::new(),
            outcome: CycleOutcome::Completed,
        }
    }

    fn ended(mut self, outcome: CycleOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// A cycle that found no usable repository and touched nothing.
    pub(crate) fn unavailable(reason: impl Into<String>) -> Self {
        Self::new().ended(CycleOutcome::RepositoryUnavailable(reason.into()))
    }

    /// True when the cycle did not stop early.
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, CycleOutcome::Failed(_))
    }
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Per-commit step that stops the loop.
enum Stop {
    Source(SourceControlError),
    State(StateError),
    Write(WriteError),
}

/// Drives a poll cycle over a commit source and a draft generator.
pub struct PollEngine<'a> {
    config: &'a RepoConfig,
    source: &'a dyn CommitSource,
    generator: &'a dyn DraftGenerator,
    rules: SkipRules,
    writer: QueueWriter,
    state_path: PathBuf,
    retry_delay: Duration,
    clock: Clock,
}

impl<'a> PollEngine<'a> {
    /// Creates an engine. Fails only if the skip rules do not compile.
    pub fn new(
        config: &'a RepoConfig,
        source: &'a dyn CommitSource,
        generator: &'a dyn DraftGenerator,
    ) -> Result<Self, crate::config::ConfigError> {
        Ok(Self {
            rules: config.skip_rules()?,
            writer: QueueWriter::from_config(config),
            state_path: config.state_path(),
            config,
            source,
            generator,
            retry_delay: DEFAULT_RETRY_DELAY,
            clock: Box::new(Utc::now),
        })
    }

    /// Overrides the pause before a generation retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Overrides the time source.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// State file this engine reads and writes.
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn save(&self, state: &PipelineState) -> Result<(), StateError> {
        state::save_at(&self.state_path, state, self.now())
    }

    fn mark_processed(&self, state: &mut PipelineState, commit: &CommitRecord) -> Result<(), StateError> {
        state.mark_processed(&commit.id, self.now());
        self.save(state)
    }

    /// Runs one cycle against `catalog`.
    pub async fn run_cycle(&self, catalog: &TemplateCatalog) -> CycleReport {
        let report = CycleReport::new();

        if let Err(e) = self.source.verify() {
            warn!("Repository unavailable: {e}");
            return report.ended(CycleOutcome::RepositoryUnavailable(e.to_string()));
        }
        let head = match self.source.head_id() {
            Ok(Some(head)) => head,
            Ok(None) => {
                warn!("Repository has no commits yet");
                return report.ended(CycleOutcome::EmptyRepository);
            }
            Err(e) => {
                warn!("Repository unavailable: {e}");
                return report.ended(CycleOutcome::RepositoryUnavailable(e.to_string()));
            }
        };

        let had_state_file = self.state_path.exists();
        let loaded = state::load_at(&self.state_path, self.now());
        let mut state = loaded.state;
        if loaded.recovered {
            if had_state_file {
                warn!("State file invalid; resetting baseline to current HEAD {}", short_id(&head));
                state = PipelineState::new(Some(head), self.now());
                return match self.save(&state) {
                    Ok(()) => report.ended(CycleOutcome::StateRecovered),
                    Err(e) => {
                        error!("Failed to persist recovered state: {e}");
                        report.ended(CycleOutcome::Failed(e.into()))
                    }
                };
            }
            info!("State file not found; first-run mode enabled");
        }
        if loaded.rolled_over {
            info!(week_start = %state.ledger.week_start, "Weekly content ledger rolled over");
        }

        let commits = match self.discover(state.cursor.as_deref()) {
            Ok(commits) => commits,
            Err(e) => {
                error!("Git read failed: {e}");
                return report.ended(CycleOutcome::Failed(CycleFailure::Discovery(e)));
            }
        };

        if commits.is_empty() {
            state.touch(self.now());
            if let Err(e) = self.save(&state) {
                error!("Failed to persist state: {e}");
                return report.ended(CycleOutcome::Failed(e.into()));
            }
            info!("Poll cycle complete: 0 new commits");
            return report;
        }

        let mut report = report;
        report.discovered = commits.len();
        let mut failure = None;

        for commit in &commits {
            if let Err(stop) = self.process(commit, &mut state, catalog, &mut report).await {
                let short = short_id(&commit.id).to_string();
                failure = Some(match stop {
                    Stop::Source(source) => CycleFailure::Source { commit: short, source },
                    Stop::State(e) => CycleFailure::State(e),
                    Stop::Write(source) => CycleFailure::Write { commit: short, source },
                });
                break;
            }
        }

        if failure.is_none() && report.processed == 0 {
            state.touch(self.now());
            if let Err(e) = self.save(&state) {
                failure = Some(e.into());
            }
        }

        if let Some(failure) = failure {
            error!("{failure}");
            warn!("Poll cycle ended early; remaining commits will retry next cycle");
            report.outcome = CycleOutcome::Failed(failure);
        }

        info!(
            discovered = report.discovered,
            processed = report.processed,
            kept = report.kept,
            skipped = report.skipped,
            "Poll cycle complete"
        );
        report
    }

    fn discover(&self, cursor: Option<&str>) -> Result<Vec<CommitRecord>, SourceControlError> {
        match self.source.commits_since(cursor) {
            Err(SourceControlError::HistoryRewritten(id)) => {
                warn!(
                    "Last seen commit {} not present in history; resetting baseline to current HEAD",
                    short_id(&id)
                );
                self.source.commits_since(None)
            }
            result => result,
        }
    }

    async fn process(
        &self,
        commit: &CommitRecord,
        state: &mut PipelineState,
        catalog: &TemplateCatalog,
        report: &mut CycleReport,
    ) -> Result<(), Stop> {
        let short = short_id(&commit.id);

        if state.dedup_window.contains(&commit.id) {
            info!(commit = %short, "Skipping already-processed commit");
            state.cursor = Some(commit.id.clone());
            return Ok(());
        }

        let files_changed = self.source.changed_files(&commit.id).map_err(Stop::Source)?;

        let decision = self.rules.should_keep(&commit.message, &files_changed);
        if !decision.keep {
            info!(commit = %short, "Skipping commit: {}", decision.reason);
            self.mark_processed(state, commit).map_err(Stop::State)?;
            report.processed += 1;
            report.skipped += 1;
            return Ok(());
        }

        let raw_diff = self.source.diff(&commit.id).map_err(Stop::Source)?;
        let diff_stat = self.source.diff_stat(&commit.id).map_err(Stop::Source)?;

        let (sanitized_diff, redactions) = redact(&raw_diff, &self.config.secret_patterns);
        if redactions > 0 {
            warn!(commit = %short, redactions, "Secret scanner redacted matches in diff");
        }

        let current_branch = self.source.branch_name().map_err(Stop::Source)?;
        let recent_history = self
            .source
            .recent_messages(self.config.lookback_commits)
            .map_err(Stop::Source)?;

        let context = GenerationContext::build(
            self.config,
            commit,
            CommitDetails {
                files_changed,
                sanitized_diff,
                current_branch,
                recent_history,
            },
            &state.ledger,
        );

        info!(commit = %short, "Detected commit: {}", commit.message);
        if let Some(first) = diff_stat.trim().lines().next() {
            debug!(commit = %short, "Diff stat: {first}");
        }
        info!(
            commit = %short,
            "Context recommendation: {}", context.content_balance.recommendation
        );

        let Some(outcome) = self.generate_with_retry(commit, &context, catalog).await else {
            self.mark_processed(state, commit).map_err(Stop::State)?;
            report.processed += 1;
            report.kept += 1;
            return Ok(());
        };

        if outcome.drafts.is_empty() {
            let reason = if outcome.skip_reason.is_empty() {
                "no drafts returned"
            } else {
                outcome.skip_reason.as_str()
            };
            info!(commit = %short, "No drafts for commit: {reason}");
            self.mark_processed(state, commit).map_err(Stop::State)?;
            report.processed += 1;
            report.kept += 1;
            return Ok(());
        }

        match self.writer.write_at(&outcome.drafts, state, commit, self.now()) {
            Ok(paths) => report.queued.extend(paths),
            Err(e) => {
                report.queued.extend(e.written.iter().cloned());
                // Keep the counters for files that did land on disk.
                if let Err(save_err) = self.save(state) {
                    error!("Failed to persist partial queue progress: {save_err}");
                }
                return Err(Stop::Write(e));
            }
        }

        self.mark_processed(state, commit).map_err(Stop::State)?;
        report.processed += 1;
        report.kept += 1;
        Ok(())
    }

    /// Two attempts with a pause between them. `None` when both fail.
    async fn generate_with_retry(
        &self,
        commit: &CommitRecord,
        context: &GenerationContext,
        catalog: &TemplateCatalog,
    ) -> Option<GenerationOutcome> {
        let short = short_id(&commit.id);
        let max_drafts = self.config.max_drafts_per_commit;

        let first_error = match self.generator.generate(context, catalog, max_drafts).await {
            Ok(outcome) => return Some(outcome),
            Err(e) => e,
        };
        warn!(
            commit = %short,
            "Generation attempt 1 failed: {first_error}. Retrying in {}s",
            self.retry_delay.as_secs()
        );
        tokio::time::sleep(self.retry_delay).await;

        match self.generator.generate(context, catalog, max_drafts).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(commit = %short, "Generation failed: {e}");
                error!(commit = %short, "Initial generation failure: {first_error}");
                None
            }
        }
    }
}
