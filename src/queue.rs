//! Queue files: one markdown file per accepted draft.
//!
//! Each file carries a fixed frontmatter header followed by the draft text.
//! Writing a draft also updates the in-memory ledger; persisting it is the
//! caller's job.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::config::RepoConfig;
use crate::generation::Draft;
use crate::git::{short_id, CommitRecord};
use crate::state::{DraftSummary, PipelineState};
use crate::utils::{format_timestamp, write_atomic};

/// Reminder attached to every draft about staying around after posting.
pub const AVAILABILITY_REMINDER: &str =
    "Be available for 60 min after posting. Reply to every reply substantively.";
/// Reminder about posting cadence.
pub const SPACING_REMINDER: &str = "Space 2-3 hours from last post. Max 2-4 posts/day.";

const MAX_SLUG_LEN: usize = 50;

/// A queue write failed part way through a batch.
///
/// Files listed in `written` are on disk and already counted in the
/// in-memory ledger.
#[derive(Error, Debug)]
#[error("failed to write queue file {path}: {source}")]
pub struct WriteError {
    /// File that could not be written.
    pub path: PathBuf,
    /// Underlying I/O error.
    pub source: std::io::Error,
    /// Files written before the failure, in order.
    pub written: Vec<PathBuf>,
}

/// Renders drafts into the queue directory.
#[derive(Debug, Clone)]
pub struct QueueWriter {
    queue_dir: PathBuf,
    project_name: String,
    engagement_reminder: String,
}

/// Lowercase slug of a commit subject, at most 50 characters.
pub fn slugify(message: &str) -> String {
    let mut slug = String::with_capacity(message.len());
    let mut pending_dash = false;
    for ch in message.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        let trimmed = slug.trim_end_matches('-').len();
        slug.truncate(trimmed);
    }
    if slug.is_empty() {
        "commit".to_string()
    } else {
        slug
    }
}

/// `{counter:03}_{YYYY-MM-DD}_{slug}_{template}.md`
pub fn queue_filename(queue_number: u64, date: &str, slug: &str, template_type: &str) -> String {
    format!("{queue_number:03}_{date}_{slug}_{template_type}.md")
}

pub(crate) fn yaml_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

impl QueueWriter {
    /// Creates a writer for `queue_dir`.
    pub fn new(
        queue_dir: impl Into<PathBuf>,
        project_name: impl Into<String>,
        engagement_reminder: impl Into<String>,
    ) -> Self {
        Self {
            queue_dir: queue_dir.into(),
            project_name: project_name.into(),
            engagement_reminder: engagement_reminder.into(),
        }
    }

    /// Creates a writer from repository settings.
    pub fn from_config(config: &RepoConfig) -> Self {
        Self::new(
            &config.queue_dir,
            &config.project_name,
            &config.content_policy.engagement_reminder,
        )
    }

    /// Queue directory.
    pub fn queue_dir(&self) -> &Path {
        &self.queue_dir
    }

    /// Writes `drafts` in order, stamped with the current time.
    pub fn write(
        &self,
        drafts: &[Draft],
        state: &mut PipelineState,
        commit: &CommitRecord,
    ) -> Result<Vec<PathBuf>, WriteError> {
        self.write_at(drafts, state, commit, Utc::now())
    }

    /// Writes `drafts` in order, stamped with `now`.
    pub fn write_at(
        &self,
        drafts: &[Draft],
        state: &mut PipelineState,
        commit: &CommitRecord,
        now: DateTime<Utc>,
    ) -> Result<Vec<PathBuf>, WriteError> {
        let mut written = Vec::with_capacity(drafts.len());

        if let Err(source) = fs::create_dir_all(&self.queue_dir) {
            return Err(WriteError {
                path: self.queue_dir.clone(),
                source,
                written,
            });
        }

        let generated_at = format_timestamp(now);
        let date = now.format("%Y-%m-%d").to_string();
        let slug = slugify(&commit.message);

        for draft in drafts {
            state.queue_counter += 1;
            let queue_number = state.queue_counter;
            let path = self.queue_dir.join(queue_filename(
                queue_number,
                &date,
                &slug,
                &draft.template_type,
            ));

            let markdown = self.render(draft, queue_number, commit, &generated_at);
            if let Err(source) = write_atomic(&path, markdown.as_bytes()) {
                return Err(WriteError {
                    path,
                    source,
                    written,
                });
            }

            state.ledger.push_recent(DraftSummary {
                queue_number,
                commit_sha: commit.id.clone(),
                template_type: draft.template_type.clone(),
                content_category: draft.content_category.as_str().to_string(),
                generated_at: generated_at.clone(),
                is_thread: draft.is_thread,
            });
            state.ledger.record_template(&draft.template_type);

            info!(
                commit = %short_id(&commit.id),
                queue = queue_number,
                template = %draft.template_type,
                path = %path.display(),
                "Queued draft"
            );
            written.push(path);
        }

        Ok(written)
    }

    /// Frontmatter header plus body.
    pub fn render(
        &self,
        draft: &Draft,
        queue_number: u64,
        commit: &CommitRecord,
        generated_at: &str,
    ) -> String {
        let signals = draft
            .target_signals
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let mut lines = vec![
            "---".to_string(),
            format!("queue: {queue_number}"),
            format!("template: {}", draft.template_type),
            format!("category: {}", yaml_quote(draft.content_category.as_str())),
            format!("suggested_time: {}", draft.suggested_time),
            format!("target_signals: [{signals}]"),
            format!("is_thread: {}", draft.is_thread),
            format!("commit: {}", commit.id),
            format!("commit_message: {}", yaml_quote(&commit.message)),
            format!("generated_at: {}", yaml_quote(generated_at)),
            format!("project: {}", self.project_name),
            format!("engagement_reminder: {}", yaml_quote(&self.engagement_reminder)),
            format!("availability_reminder: {}", yaml_quote(AVAILABILITY_REMINDER)),
            format!("spacing_reminder: {}", yaml_quote(SPACING_REMINDER)),
        ];
        if draft.is_thread {
            lines.push(format!("tweet_count: {}", draft.thread_parts().len().max(1)));
        }
        lines.push("---".to_string());

        format!("{}\n\n{}\n", lines.join("\n"), draft.content.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{Audience, Signal, SuggestedTime};
    use chrono::TimeZone;

    fn draft(template_type: &str) -> Draft {
        Draft {
            template_type: template_type.to_string(),
            content_category: Audience::AiCuriousBuilder,
            suggested_time: SuggestedTime::WeekdayMorning,
            target_signals: vec![Signal::DwellTime, Signal::ProfileClick],
            is_thread: false,
            content: "First line".to_string(),
        }
    }

    fn commit() -> CommitRecord {
        CommitRecord {
            id: "abc1234def".to_string(),
            message: "Add \"important\" thing".to_string(),
            author: "Tester".to_string(),
            date: chrono::DateTime::parse_from_rfc3339("2026-10-16T00:00:00Z").unwrap(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    #[test]
    fn slugify_collapses_and_bounds() {
        assert_eq!(slugify("Add \"important\" thing"), "add-important-thing");
        assert_eq!(slugify("  --Fix: the  BUG!! "), "fix-the-bug");
        assert_eq!(slugify("!!!"), "commit");
        assert_eq!(slugify("日本語"), "commit");
        let long = "a".repeat(49) + " b" + &"c".repeat(10);
        assert_eq!(slugify(&long), "a".repeat(49));
        assert!(slugify(&"word ".repeat(30)).len() <= 50);
    }

    #[test]
    fn writes_file_and_updates_ledger() {
        let temp_dir = tempfile::tempdir().unwrap();
        let writer = QueueWriter::new(temp_dir.path().join("queue"), "Test", "Engage.");
        let mut state = PipelineState::new(None, now());

        let paths = writer
            .write_at(&[draft("authority"), draft("translation")], &mut state, &commit(), now())
            .unwrap();

        assert_eq!(paths.len(), 2);
        assert_eq!(
            paths[0].file_name().unwrap().to_str().unwrap(),
            "001_2026-10-18_add-important-thing_authority.md"
        );
        let content = fs::read_to_string(&paths[0]).unwrap();
        assert!(content.starts_with("---\nqueue: 1\ntemplate: authority\n"));
        assert!(content.contains("category: \"AI-Curious Builder\""));
        assert!(content.contains("target_signals: [dwell_time, profile_click]"));
        assert!(content.contains("commit_message: \"Add \\\"important\\\" thing\""));
        assert!(content.contains("generated_at: \"2026-10-18T12:00:00Z\""));
        assert!(content.contains("engagement_reminder: \"Engage.\""));
        assert!(!content.contains("tweet_count"));
        assert!(content.ends_with("---\n\nFirst line\n"));

        assert_eq!(state.queue_counter, 2);
        assert_eq!(state.ledger.category_counts.authority, 1);
        assert_eq!(state.ledger.category_counts.translation, 1);
        assert_eq!(state.ledger.saveable_count, 1);
        assert_eq!(state.ledger.recent_drafts.len(), 2);
        assert_eq!(state.ledger.recent_drafts[1].queue_number, 2);
        assert_eq!(state.ledger.recent_drafts[1].content_category, "AI-Curious Builder");
    }

    #[test]
    fn thread_drafts_carry_tweet_count() {
        let writer = QueueWriter::new("/unused", "Test", "Engage.");
        let mut thread = draft("thread");
        thread.is_thread = true;
        thread.content = "one\n---\ntwo\n---\nthree".to_string();
        let rendered = writer.render(&thread, 7, &commit(), "2026-10-18T12:00:00Z");
        assert!(rendered.contains("is_thread: true\n"));
        assert!(rendered.contains("tweet_count: 3\n---"));
    }

    #[test]
    fn failure_mid_batch_keeps_earlier_progress() {
        let temp_dir = tempfile::tempdir().unwrap();
        let queue_dir = temp_dir.path().join("queue");
        // A directory squatting on the second file name makes its rename fail.
        fs::create_dir_all(queue_dir.join("002_2026-10-18_add-important-thing_growth.md")).unwrap();

        let writer = QueueWriter::new(&queue_dir, "Test", "Engage.");
        let mut state = PipelineState::new(None, now());
        let err = writer
            .write_at(&[draft("authority"), draft("growth")], &mut state, &commit(), now())
            .unwrap_err();

        assert_eq!(err.written.len(), 1);
        assert!(err.written[0].is_file());
        assert_eq!(state.ledger.category_counts.authority, 1);
        assert_eq!(state.ledger.category_counts.growth, 0);
        assert_eq!(state.ledger.recent_drafts.len(), 1);
    }
}
