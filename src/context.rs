//! The payload handed to the generation service for one commit.

use std::fs;

use serde::Serialize;
use tracing::warn;

use crate::config::{ContentBalance, RepoConfig};
use crate::git::CommitRecord;
use crate::state::{CategoryCounts, ContentCategory, ContentLedger};
use crate::utils::format_timestamp;

/// Diff text beyond this many characters is cut.
pub const MAX_DIFF_SUMMARY_CHARS: usize = 12_000;

const DIFF_TRUNCATION_MARKER: &str = "\n\n[Diff truncated for context size limits]";

/// Project identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectContext {
    /// Project name.
    pub name: String,
    /// One-paragraph description.
    pub description: String,
    /// Branch HEAD points at.
    pub current_branch: String,
}

/// The commit being drafted about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitContext {
    /// Full commit id.
    pub sha: String,
    /// Subject line.
    pub message: String,
    /// Author name.
    pub author: String,
    /// RFC 3339 in UTC.
    pub date: String,
    /// Paths touched by the commit.
    pub files_changed: Vec<String>,
    /// Redacted and possibly truncated patch text.
    pub diff_summary: String,
}

/// Weekly content mix against the configured target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceContext {
    /// Configured percentages.
    pub target: ContentBalance,
    /// Drafts per category since the week started.
    pub actual_this_week: CategoryCounts,
    /// Which category to favor next.
    pub recommendation: String,
}

/// An operator-written note file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    /// Path as configured.
    pub path: String,
    /// File text, possibly cut to the remaining budget.
    pub content: String,
}

/// Everything the generation service sees about one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationContext {
    /// Project identity.
    pub project: ProjectContext,
    /// The commit itself.
    pub current_commit: CommitContext,
    /// Recent subjects, newest first.
    pub recent_history: Vec<String>,
    /// Weekly mix.
    pub content_balance: BalanceContext,
    /// Operator notes.
    pub additional_notes: Vec<Note>,
    /// Nudge toward saveable content.
    pub saveable_reminder: String,
}

/// Repository reads gathered by the engine before the context is built.
#[derive(Debug, Clone)]
pub struct CommitDetails {
    /// Paths touched by the commit.
    pub files_changed: Vec<String>,
    /// Patch text after redaction.
    pub sanitized_diff: String,
    /// Branch HEAD points at.
    pub current_branch: String,
    /// Recent subjects, newest first.
    pub recent_history: Vec<String>,
}

impl GenerationContext {
    /// Assembles the context for `commit`.
    pub fn build(
        config: &RepoConfig,
        commit: &CommitRecord,
        details: CommitDetails,
        ledger: &ContentLedger,
    ) -> Self {
        Self {
            project: ProjectContext {
                name: config.project_name.clone(),
                description: config.project_description.clone(),
                current_branch: details.current_branch,
            },
            current_commit: CommitContext {
                sha: commit.id.clone(),
                message: commit.message.clone(),
                author: commit.author.clone(),
                date: format_timestamp(commit.date.to_utc()),
                files_changed: details.files_changed,
                diff_summary: truncate_diff(&details.sanitized_diff),
            },
            recent_history: details.recent_history,
            content_balance: BalanceContext {
                target: config.content_balance,
                actual_this_week: ledger.category_counts,
                recommendation: balance_recommendation(
                    &config.content_balance,
                    &ledger.category_counts,
                ),
            },
            additional_notes: load_notes(config),
            saveable_reminder: saveable_reminder(ledger.saveable_count),
        }
    }

    /// Pretty JSON for embedding in a prompt.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn truncate_diff(diff: &str) -> String {
    match diff.char_indices().nth(MAX_DIFF_SUMMARY_CHARS) {
        Some((cut, _)) => format!("{}{DIFF_TRUNCATION_MARKER}", &diff[..cut]),
        None => diff.to_string(),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Suggests which category the next draft should lean toward.
pub fn balance_recommendation(target: &ContentBalance, actual: &CategoryCounts) -> String {
    let total = actual.total();
    if total == 0 {
        let highest = ContentCategory::ALL
            .into_iter()
            .fold(ContentCategory::Authority, |best, c| {
                if target.get(c) > target.get(best) {
                    c
                } else {
                    best
                }
            });
        return format!(
            "No content tracked this week yet. Start with {} content to establish baseline mix.",
            capitalize(highest.as_str())
        );
    }

    let deficit = |c: ContentCategory| {
        f64::from(target.get(c)) - (actual.get(c) as f64 / total as f64) * 100.0
    };
    let (recommended, largest) = ContentCategory::ALL
        .into_iter()
        .map(|c| (c, deficit(c)))
        .fold((ContentCategory::Authority, f64::MIN), |best, cur| {
            if cur.1 > best.1 {
                cur
            } else {
                best
            }
        });

    if largest <= 0.0 {
        return "Content mix is currently balanced. Choose the template that best fits the commit."
            .to_string();
    }
    format!(
        "{} content is underrepresented. Consider a {}-type draft if the commit supports it.",
        capitalize(recommended.as_str()),
        recommended.as_str()
    )
}

/// Progress toward one saveable piece per week.
pub fn saveable_reminder(saveable_count: u64) -> String {
    if saveable_count >= 1 {
        format!(
            "{saveable_count} saveable (Translation) piece generated this week. Target: 1/week. \u{2713} On track."
        )
    } else {
        "0 saveable (Translation) pieces generated this week. Target: 1/week. Consider translation content."
            .to_string()
    }
}

/// Reads the configured note files in order until the character budget runs
/// out. Missing files are skipped.
fn load_notes(config: &RepoConfig) -> Vec<Note> {
    let mut remaining = config.context.max_total_chars;
    let mut notes = Vec::new();

    for (display, path) in config.note_paths() {
        if remaining == 0 {
            break;
        }
        if !path.is_file() {
            continue;
        }
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), "Skipping unreadable context file: {e}");
                continue;
            }
        };
        let content: String = content.chars().take(remaining).collect();
        if content.is_empty() {
            continue;
        }
        remaining -= content.chars().count();
        notes.push(Note {
            path: display,
            content,
        });
    }
    notes
}
