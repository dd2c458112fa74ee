//! The read-only view of a repository that the poll cycle depends on.

use std::path::PathBuf;

use thiserror::Error;

use super::CommitRecord;

/// Source-control read errors.
#[derive(Error, Debug)]
pub enum SourceControlError {
    /// The path is not a usable git work tree.
    #[error("not a git work tree: {path}: {source}")]
    NotARepository {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying git error.
        source: git2::Error,
    },

    /// The cursor commit no longer exists or is not an ancestor of HEAD.
    #[error("last seen commit {0} is not in current history")]
    HistoryRewritten(String),

    /// Any other git failure.
    #[error("git {operation} failed: {source}")]
    Git {
        /// What was being attempted.
        operation: String,
        /// Underlying git error.
        source: git2::Error,
    },
}

impl SourceControlError {
    /// Wraps a git error with the operation that produced it.
    pub fn git(operation: impl Into<String>, source: git2::Error) -> Self {
        Self::Git {
            operation: operation.into(),
            source,
        }
    }
}

/// Read access to commits, diffs and history.
pub trait CommitSource {
    /// Checks that the repository is still reachable.
    fn verify(&self) -> Result<(), SourceControlError>;

    /// Returns the HEAD commit id, or `None` when the repository has no commits.
    fn head_id(&self) -> Result<Option<String>, SourceControlError>;

    /// Lists commits strictly after `cursor`, oldest first.
    ///
    /// With no cursor only the HEAD commit is returned. Fails with
    /// [`SourceControlError::HistoryRewritten`] when the cursor is not
    /// reachable from HEAD.
    fn commits_since(&self, cursor: Option<&str>) -> Result<Vec<CommitRecord>, SourceControlError>;

    /// Paths changed by a commit. Root commits compare against the empty tree.
    fn changed_files(&self, id: &str) -> Result<Vec<String>, SourceControlError>;

    /// Patch text of a commit.
    fn diff(&self, id: &str) -> Result<String, SourceControlError>;

    /// Per-file change summary of a commit.
    fn diff_stat(&self, id: &str) -> Result<String, SourceControlError>;

    /// Current branch name; `unborn` placeholder when nothing resolves.
    fn branch_name(&self) -> Result<String, SourceControlError>;

    /// Subjects of the newest `count` commits reachable from HEAD.
    fn recent_messages(&self, count: usize) -> Result<Vec<String>, SourceControlError>;
}
