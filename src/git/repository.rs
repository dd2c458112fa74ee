//! git2-backed commit source.

use std::path::{Path, PathBuf};

use git2::{ErrorCode, Oid, Repository, Sort};
use tracing::debug;

use super::commit::{changed_paths, commit_diff, patch_text, stat_text};
use super::{CommitRecord, CommitSource, SourceControlError};

/// Git repository wrapper.
pub struct GitRepository {
    repo: Repository,
    root: PathBuf,
}

impl GitRepository {
    /// Opens the repository whose work tree is at `path`.
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self, SourceControlError> {
        let root = path.as_ref().to_path_buf();
        let repo = Self::open_work_tree(&root)?;
        Ok(Self { repo, root })
    }

    fn open_work_tree(root: &Path) -> Result<Repository, SourceControlError> {
        let repo = Repository::open(root).map_err(|source| SourceControlError::NotARepository {
            path: root.to_path_buf(),
            source,
        })?;
        if repo.is_bare() {
            return Err(SourceControlError::NotARepository {
                path: root.to_path_buf(),
                source: git2::Error::from_str("repository has no work tree"),
            });
        }
        Ok(repo)
    }

    /// Work tree root this repository was opened at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Access to the underlying git2::Repository.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    fn head_oid(&self) -> Result<Option<Oid>, SourceControlError> {
        match self.repo.head() {
            Ok(head) => head
                .peel_to_commit()
                .map(|commit| Some(commit.id()))
                .map_err(|e| SourceControlError::git("peel HEAD to commit", e)),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Ok(None)
            }
            Err(e) => Err(SourceControlError::git("resolve HEAD", e)),
        }
    }

    fn find_commit(&self, id: &str) -> Result<git2::Commit<'_>, SourceControlError> {
        let oid = Oid::from_str(id).map_err(|e| SourceControlError::git(format!("parse {id}"), e))?;
        self.repo
            .find_commit(oid)
            .map_err(|e| SourceControlError::git(format!("find commit {id}"), e))
    }

    /// Returns true when `id` names a commit reachable from HEAD.
    fn in_history(&self, id: &str, head: Oid) -> bool {
        let Ok(oid) = Oid::from_str(id) else {
            return false;
        };
        if self.repo.find_commit(oid).is_err() {
            return false;
        }
        oid == head || self.repo.graph_descendant_of(head, oid).unwrap_or(false)
    }

    fn record(&self, oid: Oid) -> Result<CommitRecord, SourceControlError> {
        let commit = self
            .repo
            .find_commit(oid)
            .map_err(|e| SourceControlError::git(format!("find commit {oid}"), e))?;
        CommitRecord::from_git_commit(&commit)
    }
}

impl CommitSource for GitRepository {
    fn verify(&self) -> Result<(), SourceControlError> {
        Self::open_work_tree(&self.root).map(|_| ())
    }

    fn head_id(&self) -> Result<Option<String>, SourceControlError> {
        Ok(self.head_oid()?.map(|oid| oid.to_string()))
    }

    fn commits_since(&self, cursor: Option<&str>) -> Result<Vec<CommitRecord>, SourceControlError> {
        let Some(head) = self.head_oid()? else {
            return Ok(Vec::new());
        };

        let Some(cursor) = cursor else {
            return Ok(vec![self.record(head)?]);
        };

        if !self.in_history(cursor, head) {
            return Err(SourceControlError::HistoryRewritten(cursor.to_string()));
        }
        let cursor_oid =
            Oid::from_str(cursor).map_err(|e| SourceControlError::git(format!("parse {cursor}"), e))?;

        let mut walker = self
            .repo
            .revwalk()
            .map_err(|e| SourceControlError::git("create revwalk", e))?;
        walker
            .set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)
            .map_err(|e| SourceControlError::git("sort revwalk", e))?;
        walker
            .push(head)
            .map_err(|e| SourceControlError::git("push HEAD", e))?;
        walker
            .hide(cursor_oid)
            .map_err(|e| SourceControlError::git(format!("hide {cursor}"), e))?;

        let mut commits = Vec::new();
        for oid in walker {
            let oid = oid.map_err(|e| SourceControlError::git("walk history", e))?;
            commits.push(self.record(oid)?);
        }
        debug!(cursor, count = commits.len(), "Discovered commits after cursor");
        Ok(commits)
    }

    fn changed_files(&self, id: &str) -> Result<Vec<String>, SourceControlError> {
        let commit = self.find_commit(id)?;
        let diff = commit_diff(&self.repo, &commit)?;
        Ok(changed_paths(&diff))
    }

    fn diff(&self, id: &str) -> Result<String, SourceControlError> {
        let commit = self.find_commit(id)?;
        let diff = commit_diff(&self.repo, &commit)?;
        patch_text(&diff)
    }

    fn diff_stat(&self, id: &str) -> Result<String, SourceControlError> {
        let commit = self.find_commit(id)?;
        let diff = commit_diff(&self.repo, &commit)?;
        stat_text(&diff)
    }

    fn branch_name(&self) -> Result<String, SourceControlError> {
        match self.repo.head() {
            Ok(head) => Ok(head.shorthand().unwrap_or("HEAD").to_string()),
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                // HEAD still names the branch the first commit will land on.
                let name = self
                    .repo
                    .find_reference("HEAD")
                    .ok()
                    .and_then(|r| r.symbolic_target().map(str::to_string))
                    .and_then(|target| target.strip_prefix("refs/heads/").map(str::to_string));
                Ok(name.unwrap_or_else(|| "unborn".to_string()))
            }
            Err(e) => Err(SourceControlError::git("resolve HEAD", e)),
        }
    }

    fn recent_messages(&self, count: usize) -> Result<Vec<String>, SourceControlError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let Some(head) = self.head_oid()? else {
            return Ok(Vec::new());
        };

        let mut walker = self
            .repo
            .revwalk()
            .map_err(|e| SourceControlError::git("create revwalk", e))?;
        walker
            .set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .map_err(|e| SourceControlError::git("sort revwalk", e))?;
        walker
            .push(head)
            .map_err(|e| SourceControlError::git("push HEAD", e))?;

        let mut messages = Vec::new();
        for oid in walker.take(count) {
            let oid = oid.map_err(|e| SourceControlError::git("walk history", e))?;
            let record = self.record(oid)?;
            if !record.message.is_empty() {
                messages.push(record.message);
            }
        }
        Ok(messages)
    }
}
