//! Status command: daemon liveness and pipeline counters.

use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;

use crate::daemon::daemon_state;
use crate::git::{CommitSource, GitRepository};
use crate::runner::load_config;
use crate::state::{self, CategoryCounts, ContentCategory};
use crate::utils::format_timestamp;

/// Status command options.
#[derive(Parser)]
pub struct StatusCommand {}

fn format_counts(counts: &CategoryCounts) -> String {
    ContentCategory::ALL
        .iter()
        .map(|category| format!("{category}={}", counts.get(*category)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cursor line; without a stored cursor the current HEAD is shown instead.
fn cursor_line(cursor: Option<&str>, head: Option<&str>) -> String {
    match (cursor, head) {
        (Some(cursor), _) => format!("cursor: {cursor}"),
        (None, Some(head)) => format!("cursor: none (HEAD {head})"),
        (None, None) => "cursor: none".to_string(),
    }
}

fn current_head(repo_root: &Path) -> Option<String> {
    GitRepository::open_at(repo_root)
        .ok()
        .and_then(|repo| repo.head_id().ok().flatten())
}

impl StatusCommand {
    /// Executes the status command.
    pub fn execute(self, config: Option<&Path>) -> Result<()> {
        let config = load_config(config)?;
        let now = Utc::now();
        let daemon = daemon_state(&config.status_path(), now);
        let loaded = state::load_at(&config.state_path(), now);
        let st = &loaded.state;

        println!("repo: {}", config.repo_root.display());
        println!("daemon: {}", daemon.describe());
        let head = match st.cursor {
            Some(_) => None,
            None => current_head(&config.repo_root),
        };
        println!("{}", cursor_line(st.cursor.as_deref(), head.as_deref()));
        println!("queue_counter: {}", st.queue_counter);
        println!("processed_commits: {}", st.dedup_window.len());
        println!("week_start: {}", st.ledger.week_start);
        println!("content_balance_week: {}", format_counts(&st.ledger.category_counts));
        println!("saveable_this_week: {}", st.ledger.saveable_count);
        if loaded.recovered {
            println!("last_cycle: never");
        } else {
            println!("last_cycle: {}", format_timestamp(st.last_cycle));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_render_in_category_order() {
        let counts = CategoryCounts {
            authority: 2,
            translation: 0,
            personal: 1,
            growth: 3,
        };
        assert_eq!(
            format_counts(&counts),
            "authority=2 translation=0 personal=1 growth=3"
        );
    }

    #[test]
    fn missing_cursor_falls_back_to_head() {
        assert_eq!(cursor_line(Some("abc"), Some("def")), "cursor: abc");
        assert_eq!(cursor_line(None, Some("def")), "cursor: none (HEAD def)");
        assert_eq!(cursor_line(None, None), "cursor: none");
    }

    #[test]
    fn current_head_reads_repository() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(current_head(dir.path()), None);

        let repo = git2::Repository::init(dir.path()).unwrap();
        assert_eq!(current_head(dir.path()), None);

        let sig = git2::Signature::now("Dev", "dev@example.com").unwrap();
        let tree = repo
            .find_tree(repo.index().unwrap().write_tree().unwrap())
            .unwrap();
        let oid = repo.commit(Some("HEAD"), &sig, &sig, "First", &tree, &[]).unwrap();
        assert_eq!(current_head(dir.path()), Some(oid.to_string()));
    }
}
