//! Repository bootstrap: default config, standard templates and runtime
//! directories under `.shipnote/`.
//!
//! Existing files are left alone unless `force` is set, so rerunning the
//! bootstrap on a configured repository is harmless.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use git2::Repository;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{
    DEFAULT_ARCHIVE_DIR, DEFAULT_AVOID_TOPICS, DEFAULT_CONFIG_PATH, DEFAULT_CONTEXT_FILE,
    DEFAULT_CONTEXT_MAX_TOTAL_CHARS, DEFAULT_ENGAGEMENT_REMINDER, DEFAULT_FOCUS_TOPICS,
    DEFAULT_QUEUE_DIR, DEFAULT_TEMPLATE_DIR,
};
use crate::git::{GitRepository, SourceControlError};
use crate::queue::yaml_quote;
use crate::templates::STANDARD_TEMPLATES;
use crate::utils::write_atomic;

/// Voice used when none is given.
pub const DEFAULT_VOICE_DESCRIPTION: &str = "Technical but accessible. Practical engineering tone. \
     Direct, no fluff. Occasional dry humor.";

const DEFAULT_SKIP_MESSAGE_PATTERNS: [&str; 7] = [
    "^wip",
    "^fix typo",
    "^merge branch",
    "^bump",
    "^chore:",
    "^Merge pull request",
    "^Initial commit$",
];

const DEFAULT_SKIP_FILES_ONLY: [&str; 7] = [
    "package-lock.json",
    "yarn.lock",
    "*.lock",
    ".env*",
    ".gitignore",
    "*.min.js",
    "*.min.css",
];

const DEFAULT_SECRET_PATTERNS: [&str; 10] = [
    r"(sk-[a-zA-Z0-9]{20,})",
    r"(AKIA[A-Z0-9]{16})",
    r"(ghp_[a-zA-Z0-9]{36})",
    r"(sk_live_[a-zA-Z0-9]{24,})",
    r"(pk_live_[a-zA-Z0-9]{24,})",
    r"([Bb]earer\s+[a-zA-Z0-9._~+/-]+=*)",
    r"(xox[bpsa]-[a-zA-Z0-9-]+)",
    r"([a-zA-Z0-9+/]{40,}={0,2})",
    r#"password\s*[:=]\s*["']?([^"'\s]+)"#,
    r#"secret\s*[:=]\s*["']?([^"'\s]+)"#,
];

const CONTEXT_STUB: &str = "# Project context\n\n\
    Notes written here are shared with the draft generator: audience, \
    current goals, things worth highlighting.\n";

/// Bootstrap errors.
#[derive(Error, Debug)]
pub enum ScaffoldError {
    /// The target is not an existing directory.
    #[error("target repo path does not exist or is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The target is not a git work tree and `init_git` was not requested.
    #[error("{path} is not a git repository. Run `git init` or pass --init-git")]
    NotARepository {
        /// Target directory.
        path: PathBuf,
        /// Why opening failed.
        source: SourceControlError,
    },

    /// `git init` failed.
    #[error("failed to initialize git repository at {path}: {source}")]
    GitInit {
        /// Target directory.
        path: PathBuf,
        /// Underlying error.
        source: git2::Error,
    },

    /// A directory or file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Destination.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Identity and behavior for a freshly generated config.
#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    /// Defaults to the repository directory name.
    pub project_name: Option<String>,
    /// Defaults to a one-line placeholder naming the directory.
    pub project_description: Option<String>,
    /// Defaults to [`DEFAULT_VOICE_DESCRIPTION`].
    pub voice_description: Option<String>,
    /// Daemon interval; clamped to at least one second.
    pub poll_interval_seconds: u64,
    /// Overwrite existing config and templates.
    pub force: bool,
    /// Run `git init` when the target is not yet a repository.
    pub init_git: bool,
}

/// What a bootstrap changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Absolute config path.
    pub config_path: PathBuf,
    /// Config did not exist and was written.
    pub created_config: bool,
    /// Config existed and was overwritten.
    pub updated_config: bool,
    /// Template files written.
    pub templates_written: usize,
    /// A repository was initialized.
    pub git_initialized: bool,
}

fn write_err(path: &Path) -> impl FnOnce(io::Error) -> ScaffoldError + '_ {
    move |source| ScaffoldError::Write {
        path: path.to_path_buf(),
        source,
    }
}

fn yaml_list(indent: &str, items: &[&str]) -> Vec<String> {
    items
        .iter()
        .map(|item| format!("{indent}- {}", yaml_quote(item)))
        .collect()
}

/// Renders the default `config.yaml`.
pub fn default_config_yaml(
    project_name: &str,
    project_description: &str,
    voice_description: &str,
    poll_interval_seconds: u64,
) -> String {
    let mut lines = vec![
        format!("project_name: {}", yaml_quote(project_name)),
        format!("project_description: {}", yaml_quote(project_description)),
        format!("voice_description: {}", yaml_quote(voice_description)),
        String::new(),
        format!("poll_interval_seconds: {}", poll_interval_seconds.max(1)),
        "max_drafts_per_commit: 3".to_string(),
        "lookback_commits: 10".to_string(),
        String::new(),
        format!("template_dir: {}", yaml_quote(DEFAULT_TEMPLATE_DIR)),
        format!("queue_dir: {}", yaml_quote(DEFAULT_QUEUE_DIR)),
        format!("archive_dir: {}", yaml_quote(DEFAULT_ARCHIVE_DIR)),
        String::new(),
        "context:".to_string(),
        "  additional_files:".to_string(),
    ];
    lines.extend(yaml_list("    ", &[DEFAULT_CONTEXT_FILE]));
    lines.push(format!("  max_total_chars: {DEFAULT_CONTEXT_MAX_TOTAL_CHARS}"));
    lines.push(String::new());
    lines.push("content_policy:".to_string());
    lines.push("  focus_topics:".to_string());
    lines.extend(yaml_list("    ", &DEFAULT_FOCUS_TOPICS));
    lines.push("  avoid_topics:".to_string());
    lines.extend(yaml_list("    ", &DEFAULT_AVOID_TOPICS));
    lines.push(format!(
        "  engagement_reminder: {}",
        yaml_quote(DEFAULT_ENGAGEMENT_REMINDER)
    ));
    lines.push(String::new());
    lines.push("skip_patterns:".to_string());
    lines.push("  messages:".to_string());
    lines.extend(yaml_list("    ", &DEFAULT_SKIP_MESSAGE_PATTERNS));
    lines.push("  files_only:".to_string());
    lines.extend(yaml_list("    ", &DEFAULT_SKIP_FILES_ONLY));
    lines.push("  min_meaningful_files: 1".to_string());
    lines.push(String::new());
    lines.extend(
        [
            "content_balance:",
            "  authority: 30",
            "  translation: 25",
            "  personal: 25",
            "  growth: 20",
            "",
            "secret_patterns:",
        ]
        .map(str::to_string),
    );
    lines.extend(yaml_list("  ", &DEFAULT_SECRET_PATTERNS));
    lines.push(String::new());
    lines.join("\n")
}

/// Body of a standard template, with frontmatter.
pub fn standard_template(name: &str) -> String {
    let (description, guidance) = match name {
        "authority" => (
            "Teach one concrete lesson from the change",
            "Lead with the problem the commit solved. Explain the technique in plain terms, \
             then give one takeaway a peer could apply tomorrow.",
        ),
        "translation" => (
            "Explain a technical idea for a non-specialist audience",
            "Pick the one idea from the change that matters outside engineering. \
             Use an everyday analogy and end with why it matters to the reader.",
        ),
        "personal" => (
            "Share the experience of building it",
            "Describe what it felt like to work on this: the wrong turn, the fix, \
             what you would do differently. Keep it honest and specific.",
        ),
        "growth" => (
            "Show visible progress on the project",
            "State what shipped and who it helps. One sentence of context, \
             one of result, and an open question to invite replies.",
        ),
        "thread" => (
            "Multi-post walkthrough of a larger change",
            "Three to six posts separated by a line containing only `---`. \
             The first post hooks, the middle posts walk through steps, the last one summarizes.",
        ),
        "weekly_wrapup" => (
            "Summary of the week's shipped work",
            "List the most meaningful changes of the week in a few short lines \
             and close with what comes next.",
        ),
        _ => (
            "Custom template",
            "Write a post grounded in the commit.",
        ),
    };
    format!(
        "---\nname: {name}\ncontent_type: {name}\ndescription: {}\n---\n{guidance}\n",
        yaml_quote(description)
    )
}

fn ensure_repository(root: &Path, init_git: bool) -> Result<bool, ScaffoldError> {
    match GitRepository::open_at(root) {
        Ok(_) => Ok(false),
        Err(source) if !init_git => Err(ScaffoldError::NotARepository {
            path: root.to_path_buf(),
            source,
        }),
        Err(_) => {
            Repository::init(root).map_err(|source| ScaffoldError::GitInit {
                path: root.to_path_buf(),
                source,
            })?;
            info!(path = %root.display(), "Initialized git repository");
            Ok(true)
        }
    }
}

/// Writes `content` unless `path` exists and `force` is off. Returns whether it wrote.
fn write_file(path: &Path, content: &str, force: bool) -> Result<bool, ScaffoldError> {
    if path.exists() && !force {
        debug!(path = %path.display(), "Keeping existing file");
        return Ok(false);
    }
    write_atomic(path, content.as_bytes()).map_err(write_err(path))?;
    Ok(true)
}

/// Creates or refreshes the `.shipnote/` scaffolding in `repo_path`.
pub fn bootstrap(repo_path: &Path, options: &BootstrapOptions) -> Result<BootstrapReport, ScaffoldError> {
    let root = fs::canonicalize(repo_path)
        .ok()
        .filter(|p| p.is_dir())
        .ok_or_else(|| ScaffoldError::NotADirectory(repo_path.to_path_buf()))?;
    let git_initialized = ensure_repository(&root, options.init_git)?;

    for dir in [DEFAULT_TEMPLATE_DIR, DEFAULT_QUEUE_DIR, DEFAULT_ARCHIVE_DIR] {
        let path = root.join(dir);
        fs::create_dir_all(&path).map_err(write_err(&path))?;
    }

    let dir_name = root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("project")
        .to_string();
    let project_name = options.project_name.clone().unwrap_or_else(|| dir_name.clone());
    let project_description = options
        .project_description
        .clone()
        .unwrap_or_else(|| format!("Shipnote-enabled project at {dir_name}."));
    let voice_description = options
        .voice_description
        .clone()
        .unwrap_or_else(|| DEFAULT_VOICE_DESCRIPTION.to_string());

    let config_path = root.join(DEFAULT_CONFIG_PATH);
    let existed = config_path.exists();
    let wrote_config = write_file(
        &config_path,
        &default_config_yaml(
            &project_name,
            &project_description,
            &voice_description,
            options.poll_interval_seconds,
        ),
        options.force,
    )?;

    let mut templates_written = 0;
    for name in STANDARD_TEMPLATES {
        let path = root.join(DEFAULT_TEMPLATE_DIR).join(format!("{name}.md"));
        if write_file(&path, &standard_template(name), options.force)? {
            templates_written += 1;
        }
    }

    write_file(&root.join(DEFAULT_CONTEXT_FILE), CONTEXT_STUB, false)?;

    Ok(BootstrapReport {
        config_path,
        created_config: wrote_config && !existed,
        updated_config: wrote_config && existed,
        templates_written,
        git_initialized,
    })
}
