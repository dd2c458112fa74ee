//! Commit records and per-commit diff extraction.

use chrono::{DateTime, FixedOffset};
use git2::{Commit, Diff, DiffFormat, DiffStatsFormat, Repository};
use serde::{Deserialize, Serialize};

use super::SourceControlError;

/// Width used when rendering `--stat` style summaries.
const STAT_WIDTH: usize = 80;

/// Commit metadata as discovered by the poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full SHA-1 hash of the commit.
    pub id: String,
    /// Subject line of the commit message.
    pub message: String,
    /// Author name.
    pub author: String,
    /// Author date with its original offset.
    pub date: DateTime<FixedOffset>,
}

impl CommitRecord {
    /// Creates a CommitRecord from a git2::Commit.
    pub fn from_git_commit(commit: &Commit) -> Result<Self, SourceControlError> {
        let id = commit.id().to_string();
        let author = commit.author().name().unwrap_or("Unknown").to_string();

        let when = commit.author().when();
        let offset = FixedOffset::east_opt(when.offset_minutes() * 60)
            .or_else(|| FixedOffset::east_opt(0))
            .ok_or_else(|| {
                SourceControlError::git("read commit date", git2::Error::from_str("bad offset"))
            })?;
        let date = DateTime::from_timestamp(when.seconds(), 0)
            .ok_or_else(|| {
                SourceControlError::git(
                    format!("read date of {id}"),
                    git2::Error::from_str("invalid commit timestamp"),
                )
            })?
            .with_timezone(&offset);

        let message = commit.summary().unwrap_or("").trim().to_string();

        Ok(Self {
            id,
            message,
            author,
            date,
        })
    }
}

/// Diffs a commit against its first parent, or the empty tree for a root commit.
pub(crate) fn commit_diff<'r>(
    repo: &'r Repository,
    commit: &Commit,
) -> Result<Diff<'r>, SourceControlError> {
    let commit_tree = commit
        .tree()
        .map_err(|e| SourceControlError::git("get commit tree", e))?;

    let parent_tree = if commit.parent_count() > 0 {
        Some(
            commit
                .parent(0)
                .and_then(|parent| parent.tree())
                .map_err(|e| SourceControlError::git("get parent tree", e))?,
        )
    } else {
        None
    };

    repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), None)
        .map_err(|e| SourceControlError::git(format!("diff {}", commit.id()), e))
}

/// Paths touched by a diff, in diff order.
pub(crate) fn changed_paths(diff: &Diff) -> Vec<String> {
    diff.deltas()
        .filter_map(|delta| {
            delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .and_then(|p| p.to_str())
                .map(str::to_string)
        })
        .collect()
}

/// Renders a diff as patch text.
pub(crate) fn patch_text(diff: &Diff) -> Result<String, SourceControlError> {
    let mut content = String::new();

    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        let text = std::str::from_utf8(line.content()).unwrap_or("<binary>\n");
        match line.origin() {
            '+' | '-' | ' ' => content.push(line.origin()),
            _ => {}
        }
        content.push_str(text);
        true
    })
    .map_err(|e| SourceControlError::git("format diff", e))?;

    Ok(content)
}

/// Renders a `git diff --stat` style summary.
pub(crate) fn stat_text(diff: &Diff) -> Result<String, SourceControlError> {
    let stats = diff
        .stats()
        .map_err(|e| SourceControlError::git("get diff stats", e))?;
    let buf = stats
        .to_buf(DiffStatsFormat::FULL, STAT_WIDTH)
        .map_err(|e| SourceControlError::git("format diff stats", e))?;
    Ok(buf.as_str().unwrap_or("").to_string())
}
