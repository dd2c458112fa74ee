//! Repository configuration.
//!
//! `.shipnote/config.yaml` is parsed with serde_yaml into a permissive raw
//! form, then validated into [`RepoConfig`]. Every rejection names the
//! offending key.

pub mod secrets;

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::{SkipRuleError, SkipRules};
use crate::state::{self, ContentCategory};

pub use secrets::{Secrets, SecretsError, SecretsMode, PROVIDER_API_KEYS};

/// Name of the per-repository working directory.
pub const SHIPNOTE_DIR: &str = ".shipnote";
/// Config location relative to the repository root.
pub const DEFAULT_CONFIG_PATH: &str = ".shipnote/config.yaml";
/// Lock resource guarding the pipeline state.
pub const RUNTIME_LOCK: &str = "runtime";
/// Daemon status marker file name.
pub const STATUS_FILE: &str = "daemon.json";

pub(crate) const DEFAULT_TEMPLATE_DIR: &str = ".shipnote/templates";
pub(crate) const DEFAULT_QUEUE_DIR: &str = ".shipnote/queue";
pub(crate) const DEFAULT_ARCHIVE_DIR: &str = ".shipnote/archive";
pub(crate) const DEFAULT_CONTEXT_FILE: &str = ".shipnote/context.md";
pub(crate) const DEFAULT_CONTEXT_MAX_TOTAL_CHARS: usize = 12_000;
const NOTE_EXTENSIONS: [&str; 2] = ["md", "txt"];
pub(crate) const DEFAULT_FOCUS_TOPICS: [&str; 2] = ["software engineering", "developer productivity"];
pub(crate) const DEFAULT_AVOID_TOPICS: [&str; 3] = ["politics", "sports", "crypto"];

/// Reminder attached to every queued draft unless the config overrides it.
pub const DEFAULT_ENGAGEMENT_REMINDER: &str =
    "Engage in relevant community discussions before and after posting.";

/// Configuration errors. All of them are fatal before a cycle starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No config file at the given path.
    #[error("config file not found: {0}. Create {DEFAULT_CONFIG_PATH} in your repo")]
    NotFound(PathBuf),

    /// Walking up from the start directory found no config.
    #[error("no {DEFAULT_CONFIG_PATH} found in {0} or any parent directory")]
    NotDiscovered(PathBuf),

    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid YAML for the config schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// YAML error.
        source: serde_yaml::Error,
    },

    /// A key holds an unacceptable value.
    #[error("config key '{key}' {message}")]
    Invalid {
        /// Dotted key path.
        key: String,
        /// What is wrong with it.
        message: String,
    },

    /// A regex in the config does not compile.
    #[error("invalid regex in '{key}': {source}")]
    Pattern {
        /// Dotted key path with index.
        key: String,
        /// Compile error.
        source: regex::Error,
    },

    /// Skip rules failed to compile.
    #[error(transparent)]
    SkipRules(#[from] SkipRuleError),

    /// A template directory or template file is unusable.
    #[error("template error in {path}: {message}")]
    Template {
        /// Directory or file at fault.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },
}

impl ConfigError {
    fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Heuristic filter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipPatternsConfig {
    /// Regexes matched against the commit subject.
    pub messages: Vec<String>,
    /// Globs for files that do not count as meaningful changes.
    pub files_only: Vec<String>,
    /// Minimum number of meaningful files for a commit to be kept.
    pub min_meaningful_files: usize,
}

/// Target weekly mix, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContentBalance {
    /// Authority share.
    pub authority: u32,
    /// Translation share.
    pub translation: u32,
    /// Personal share.
    pub personal: u32,
    /// Growth share.
    pub growth: u32,
}

impl ContentBalance {
    /// Target percentage for one category.
    pub fn get(&self, category: ContentCategory) -> u32 {
        match category {
            ContentCategory::Authority => self.authority,
            ContentCategory::Translation => self.translation,
            ContentCategory::Personal => self.personal,
            ContentCategory::Growth => self.growth,
        }
    }

    fn total(&self) -> u32 {
        ContentCategory::ALL.iter().map(|c| self.get(*c)).sum()
    }
}

/// Extra operator-written files fed into the generation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Paths relative to the repository root.
    pub additional_files: Vec<String>,
    /// Character budget across all additional files.
    pub max_total_chars: usize,
}

/// Topics and reminders shaping generated drafts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPolicy {
    /// Topics drafts should lean toward.
    pub focus_topics: Vec<String>,
    /// Topics drafts must never touch.
    pub avoid_topics: Vec<String>,
    /// Reminder appended to every queue file.
    pub engagement_reminder: String,
}

/// Validated repository configuration.
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// Absolute path of the config file.
    pub config_path: PathBuf,
    /// Repository work tree root.
    pub repo_root: PathBuf,
    /// `.shipnote` directory under the root.
    pub shipnote_dir: PathBuf,
    /// Project name shown to the generator.
    pub project_name: String,
    /// Short project description.
    pub project_description: String,
    /// How drafts should sound.
    pub voice_description: String,
    /// Seconds between daemon cycles.
    pub poll_interval_seconds: u64,
    /// Upper bound on drafts per commit.
    pub max_drafts_per_commit: usize,
    /// Recent subjects included as history.
    pub lookback_commits: usize,
    /// Template directory.
    pub template_dir: PathBuf,
    /// Where queue files are written.
    pub queue_dir: PathBuf,
    /// Where posted drafts are archived.
    pub archive_dir: PathBuf,
    /// Heuristic filter settings.
    pub skip_patterns: SkipPatternsConfig,
    /// Target weekly mix.
    pub content_balance: ContentBalance,
    /// Regexes redacted from diffs.
    pub secret_patterns: Vec<String>,
    /// Additional context files.
    pub context: ContextConfig,
    /// Topic policy and reminders.
    pub content_policy: ContentPolicy,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    project_name: Option<String>,
    project_description: Option<String>,
    voice_description: Option<String>,
    poll_interval_seconds: Option<i64>,
    max_drafts_per_commit: Option<i64>,
    lookback_commits: Option<i64>,
    template_dir: Option<String>,
    queue_dir: Option<String>,
    archive_dir: Option<String>,
    skip_patterns: Option<RawSkipPatterns>,
    content_balance: Option<RawContentBalance>,
    secret_patterns: Option<Vec<String>>,
    #[serde(default)]
    context: RawContext,
    #[serde(default)]
    content_policy: RawContentPolicy,
}

#[derive(Debug, Default, Deserialize)]
struct RawSkipPatterns {
    messages: Option<Vec<String>>,
    files_only: Option<Vec<String>>,
    min_meaningful_files: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawContentBalance {
    authority: Option<i64>,
    translation: Option<i64>,
    personal: Option<i64>,
    growth: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawContext {
    additional_files: Option<Vec<String>>,
    max_total_chars: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawContentPolicy {
    focus_topics: Option<Vec<String>>,
    avoid_topics: Option<Vec<String>>,
    engagement_reminder: Option<String>,
}

fn required_str(raw: Option<String>, key: &str) -> Result<String, ConfigError> {
    match raw {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::invalid(key, "must be a non-empty string")),
    }
}

fn str_or(raw: Option<String>, key: &str, default: &str) -> Result<String, ConfigError> {
    match raw {
        None => Ok(default.to_string()),
        value => required_str(value, key),
    }
}

fn int_at_least<T: TryFrom<i64>>(
    raw: Option<i64>,
    key: &str,
    minimum: i64,
    default: Option<i64>,
) -> Result<T, ConfigError> {
    let value = raw
        .or(default)
        .ok_or_else(|| ConfigError::invalid(key, "must be an integer"))?;
    if value < minimum {
        return Err(ConfigError::invalid(key, format!("must be >= {minimum}")));
    }
    T::try_from(value).map_err(|_| ConfigError::invalid(key, "is out of range"))
}

fn percentage(raw: Option<i64>, key: &str) -> Result<u32, ConfigError> {
    let value: u32 = int_at_least(raw, key, 0, None)?;
    if value > 100 {
        return Err(ConfigError::invalid(key, "must be <= 100"));
    }
    Ok(value)
}

fn non_empty_list(raw: Option<Vec<String>>, key: &str, default: &[&str]) -> Result<Vec<String>, ConfigError> {
    let values = raw.unwrap_or_else(|| default.iter().map(|s| (*s).to_string()).collect());
    if values.is_empty() {
        return Err(ConfigError::invalid(key, "must contain at least one value"));
    }
    for (idx, value) in values.iter().enumerate() {
        if value.trim().is_empty() {
            return Err(ConfigError::invalid(
                format!("{key}[{idx}]"),
                "must be a non-empty string",
            ));
        }
    }
    Ok(values)
}

fn validate_patterns(patterns: &[String], key: &str) -> Result<(), ConfigError> {
    for (idx, pattern) in patterns.iter().enumerate() {
        regex::Regex::new(pattern).map_err(|source| ConfigError::Pattern {
            key: format!("{key}[{idx}]"),
            source,
        })?;
    }
    Ok(())
}

/// Resolves `value` against `root` without touching the file system,
/// rejecting absolute paths and paths that climb out of the root.
fn repo_relative(root: &Path, value: &str, key: &str) -> Result<PathBuf, ConfigError> {
    let rel = Path::new(value);
    if rel.is_absolute() {
        return Err(ConfigError::invalid(key, "must be a relative path"));
    }
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(ConfigError::invalid(
                        key,
                        format!("resolves outside repository root: {value}"),
                    ));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ConfigError::invalid(key, "must be a relative path"));
            }
        }
    }
    Ok(parts.iter().fold(root.to_path_buf(), |acc, part| acc.join(part)))
}

/// Resolves an additional context file, which must be a `.md` or `.txt`
/// file under the repository's `.shipnote/` directory.
fn note_path(root: &Path, value: &str, key: &str) -> Result<PathBuf, ConfigError> {
    let resolved = repo_relative(root, value.trim(), key)?;
    if !resolved.starts_with(root.join(SHIPNOTE_DIR)) {
        return Err(ConfigError::invalid(
            key,
            format!("must be under {SHIPNOTE_DIR}: {value}"),
        ));
    }
    let allowed = resolved
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| NOTE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
    if !allowed {
        return Err(ConfigError::invalid(
            key,
            format!("must use one of [.md, .txt]: {value}"),
        ));
    }
    Ok(resolved)
}

/// Repository root for a config path: the parent of `.shipnote/`, or the
/// config's own directory otherwise.
pub fn resolve_repo_root(config_path: &Path) -> PathBuf {
    let parent = config_path.parent().unwrap_or_else(|| Path::new("."));
    if parent.file_name().is_some_and(|name| name == SHIPNOTE_DIR) {
        parent.parent().unwrap_or(parent).to_path_buf()
    } else {
        parent.to_path_buf()
    }
}

impl RepoConfig {
    /// Reads and validates the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(ConfigError::invalid(
                path.display().to_string(),
                "is not a file",
            ));
        }
        let config_path = fs::canonicalize(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        Self::from_yaml_str(&content, &config_path)
    }

    /// Walks up from `start` looking for `.shipnote/config.yaml`.
    pub fn discover(start: &Path) -> Result<PathBuf, ConfigError> {
        start
            .ancestors()
            .map(|dir| dir.join(DEFAULT_CONFIG_PATH))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| ConfigError::NotDiscovered(start.to_path_buf()))
    }

    /// Parses and validates YAML text as if it were read from `config_path`.
    pub fn from_yaml_str(content: &str, config_path: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: config_path.to_path_buf(),
                source,
            })?
        };
        Self::validate(raw, config_path)
    }

    fn validate(raw: RawConfig, config_path: &Path) -> Result<Self, ConfigError> {
        let repo_root = resolve_repo_root(config_path);

        let project_name = required_str(raw.project_name, "project_name")?;
        let project_description = required_str(raw.project_description, "project_description")?;
        let voice_description = required_str(raw.voice_description, "voice_description")?;

        let poll_interval_seconds =
            int_at_least(raw.poll_interval_seconds, "poll_interval_seconds", 1, Some(60))?;
        let max_drafts_per_commit =
            int_at_least(raw.max_drafts_per_commit, "max_drafts_per_commit", 1, Some(3))?;
        let lookback_commits =
            int_at_least(raw.lookback_commits, "lookback_commits", 1, Some(10))?;

        let template_dir = repo_relative(
            &repo_root,
            &str_or(raw.template_dir, "template_dir", DEFAULT_TEMPLATE_DIR)?,
            "template_dir",
        )?;
        let queue_dir = repo_relative(
            &repo_root,
            &str_or(raw.queue_dir, "queue_dir", DEFAULT_QUEUE_DIR)?,
            "queue_dir",
        )?;
        let archive_dir = repo_relative(
            &repo_root,
            &str_or(raw.archive_dir, "archive_dir", DEFAULT_ARCHIVE_DIR)?,
            "archive_dir",
        )?;

        let skip_raw = raw
            .skip_patterns
            .ok_or_else(|| ConfigError::invalid("skip_patterns", "must be an object"))?;
        let skip_patterns = SkipPatternsConfig {
            messages: skip_raw
                .messages
                .ok_or_else(|| ConfigError::invalid("skip_patterns.messages", "must be a list"))?,
            files_only: skip_raw
                .files_only
                .ok_or_else(|| ConfigError::invalid("skip_patterns.files_only", "must be a list"))?,
            min_meaningful_files: int_at_least(
                skip_raw.min_meaningful_files,
                "skip_patterns.min_meaningful_files",
                0,
                Some(1),
            )?,
        };
        validate_patterns(&skip_patterns.messages, "skip_patterns.messages")?;
        SkipRules::new(
            &skip_patterns.messages,
            &skip_patterns.files_only,
            skip_patterns.min_meaningful_files,
        )?;

        let balance_raw = raw
            .content_balance
            .ok_or_else(|| ConfigError::invalid("content_balance", "must be an object"))?;
        let content_balance = ContentBalance {
            authority: percentage(balance_raw.authority, "content_balance.authority")?,
            translation: percentage(balance_raw.translation, "content_balance.translation")?,
            personal: percentage(balance_raw.personal, "content_balance.personal")?,
            growth: percentage(balance_raw.growth, "content_balance.growth")?,
        };
        if content_balance.total() != 100 {
            return Err(ConfigError::invalid(
                "content_balance",
                "percentages must sum to 100",
            ));
        }

        let secret_patterns = raw
            .secret_patterns
            .ok_or_else(|| ConfigError::invalid("secret_patterns", "must be a list"))?;
        validate_patterns(&secret_patterns, "secret_patterns")?;

        let additional_files = raw
            .context
            .additional_files
            .unwrap_or_else(|| vec![DEFAULT_CONTEXT_FILE.to_string()]);
        for (idx, value) in additional_files.iter().enumerate() {
            let key = format!("context.additional_files[{idx}]");
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(key, "must be a non-empty string"));
            }
            note_path(&repo_root, value, &key)?;
        }
        let context = ContextConfig {
            additional_files,
            max_total_chars: int_at_least(
                raw.context.max_total_chars,
                "context.max_total_chars",
                1,
                Some(DEFAULT_CONTEXT_MAX_TOTAL_CHARS as i64),
            )?,
        };

        let content_policy = ContentPolicy {
            focus_topics: non_empty_list(
                raw.content_policy.focus_topics,
                "content_policy.focus_topics",
                &DEFAULT_FOCUS_TOPICS,
            )?,
            avoid_topics: non_empty_list(
                raw.content_policy.avoid_topics,
                "content_policy.avoid_topics",
                &DEFAULT_AVOID_TOPICS,
            )?,
            engagement_reminder: str_or(
                raw.content_policy.engagement_reminder,
                "content_policy.engagement_reminder",
                DEFAULT_ENGAGEMENT_REMINDER,
            )?,
        };

        Ok(Self {
            config_path: config_path.to_path_buf(),
            shipnote_dir: repo_root.join(SHIPNOTE_DIR),
            repo_root,
            project_name,
            project_description,
            voice_description,
            poll_interval_seconds,
            max_drafts_per_commit,
            lookback_commits,
            template_dir,
            queue_dir,
            archive_dir,
            skip_patterns,
            content_balance,
            secret_patterns,
            context,
            content_policy,
        })
    }

    /// Compiles the heuristic filter rules.
    pub fn skip_rules(&self) -> Result<SkipRules, ConfigError> {
        Ok(SkipRules::new(
            &self.skip_patterns.messages,
            &self.skip_patterns.files_only,
            self.skip_patterns.min_meaningful_files,
        )?)
    }

    /// Persisted pipeline state location.
    pub fn state_path(&self) -> PathBuf {
        state::state_path(&self.shipnote_dir)
    }

    /// Additional context files as `(configured path, absolute path)` pairs.
    pub fn note_paths(&self) -> Vec<(String, PathBuf)> {
        self.context
            .additional_files
            .iter()
            .filter_map(|value| {
                note_path(&self.repo_root, value, "context.additional_files")
                    .ok()
                    .map(|path| (value.trim().to_string(), path))
            })
            .collect()
    }

    /// Daemon status marker location.
    pub fn status_path(&self) -> PathBuf {
        self.shipnote_dir.join(STATUS_FILE)
    }

    /// Creates the working, queue and archive directories.
    pub fn ensure_runtime_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.shipnote_dir)?;
        fs::create_dir_all(&self.queue_dir)?;
        fs::create_dir_all(&self.archive_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
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

    fn parse(content: &str) -> Result<RepoConfig, ConfigError> {
        RepoConfig::from_yaml_str(content, Path::new("/repo/.shipnote/config.yaml"))
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.repo_root, PathBuf::from("/repo"));
        assert_eq!(config.shipnote_dir, PathBuf::from("/repo/.shipnote"));
        assert_eq!(config.poll_interval_seconds, 60);
        assert_eq!(config.max_drafts_per_commit, 3);
        assert_eq!(config.lookback_commits, 10);
        assert_eq!(config.template_dir, PathBuf::from("/repo/.shipnote/templates"));
        assert_eq!(config.queue_dir, PathBuf::from("/repo/.shipnote/queue"));
        assert_eq!(config.archive_dir, PathBuf::from("/repo/.shipnote/archive"));
        assert_eq!(config.context.additional_files, vec![".shipnote/context.md"]);
        assert_eq!(config.context.max_total_chars, 12_000);
        assert_eq!(config.content_policy.avoid_topics.len(), 3);
        assert_eq!(
            config.content_policy.engagement_reminder,
            DEFAULT_ENGAGEMENT_REMINDER
        );
        assert_eq!(config.state_path(), PathBuf::from("/repo/.shipnote/state.json"));
        assert_eq!(config.status_path(), PathBuf::from("/repo/.shipnote/daemon.json"));
    }

    #[test]
    fn missing_project_name_is_rejected() {
        let content = MINIMAL.replace("project_name: \"Acme\"\n", "");
        let err = parse(&content).unwrap_err();
        assert!(err.to_string().contains("'project_name'"));
    }

    #[test]
    fn balance_must_sum_to_100() {
        let content = MINIMAL.replace("growth: 10", "growth: 11");
        let err = parse(&content).unwrap_err();
        assert!(err.to_string().contains("sum to 100"));
    }

    #[test]
    fn oversized_balance_value_is_rejected_not_truncated() {
        let content = MINIMAL.replace("authority: 40", "authority: 4294967336");
        let err = parse(&content).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { ref key, .. } if key == "content_balance.authority"
        ));
    }

    #[test]
    fn balance_values_above_100_fail_before_summing() {
        let content = MINIMAL
            .replace("authority: 40", "authority: 4294967295")
            .replace("translation: 30", "translation: 101");
        let err = parse(&content).unwrap_err();
        assert!(err.to_string().contains("<= 100"));
    }

    #[test]
    fn integer_fields_reject_negatives_and_keep_full_range() {
        let content = format!("{MINIMAL}max_drafts_per_commit: -1
");
        assert!(parse(&content).is_err());
        let content = format!("{MINIMAL}poll_interval_seconds: 9223372036854775807
");
        assert_eq!(parse(&content).unwrap().poll_interval_seconds, 9_223_372_036_854_775_807);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let content = format!("{MINIMAL}poll_interval_seconds: 0\n");
        let err = parse(&content).unwrap_err();
        assert!(err.to_string().contains("must be >= 1"));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let content = MINIMAL.replace("\"^wip\"", "\"(unclosed\"");
        assert!(matches!(parse(&content), Err(ConfigError::Pattern { .. })));

        let content = MINIMAL.replace("sk-[A-Za-z0-9]{20,}", "[bad");
        let err = parse(&content).unwrap_err();
        assert!(err.to_string().contains("secret_patterns[0]"));
    }

    #[test]
    fn paths_must_stay_inside_repo() {
        let content = format!("{MINIMAL}queue_dir: ../outside\n");
        let err = parse(&content).unwrap_err();
        assert!(err.to_string().contains("outside repository root"));

        let content = format!("{MINIMAL}template_dir: /etc/templates\n");
        let err = parse(&content).unwrap_err();
        assert!(err.to_string().contains("relative path"));

        let content = format!("{MINIMAL}queue_dir: drafts/../out\n");
        assert_eq!(parse(&content).unwrap().queue_dir, PathBuf::from("/repo/out"));
    }

    #[test]
    fn context_files_must_be_notes_under_shipnote() {
        let content = format!("{MINIMAL}context:\n  additional_files: [README.md]\n");
        let err = parse(&content).unwrap_err();
        assert!(err.to_string().contains("must be under .shipnote"));

        let content = format!("{MINIMAL}context:\n  additional_files: [.shipnote/notes.json]\n");
        let err = parse(&content).unwrap_err();
        assert!(err.to_string().contains("[.md, .txt]"));

        let content = format!("{MINIMAL}context:\n  additional_files: [.shipnote/Notes.TXT]\n");
        let config = parse(&content).unwrap();
        assert_eq!(
            config.note_paths(),
            vec![(
                ".shipnote/Notes.TXT".to_string(),
                PathBuf::from("/repo/.shipnote/Notes.TXT")
            )]
        );
    }

    #[test]
    fn empty_focus_topics_is_rejected() {
        let content = format!("{MINIMAL}content_policy:\n  focus_topics: []\n");
        let err = parse(&content).unwrap_err();
        assert!(err.to_string().contains("content_policy.focus_topics"));
    }

    #[test]
    fn repo_root_without_shipnote_dir_is_config_parent() {
        assert_eq!(
            resolve_repo_root(Path::new("/work/custom.yaml")),
            PathBuf::from("/work")
        );
    }

    #[test]
    fn discover_walks_up_from_nested_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let shipnote = temp_dir.path().join(".shipnote");
        fs::create_dir_all(&shipnote).unwrap();
        fs::write(shipnote.join("config.yaml"), MINIMAL).unwrap();
        let nested = temp_dir.path().join("src").join("deep");
        fs::create_dir_all(&nested).unwrap();

        let found = RepoConfig::discover(&nested).unwrap();
        assert_eq!(found, shipnote.join("config.yaml"));

        let config = RepoConfig::load(&found).unwrap();
        assert_eq!(config.project_name, "Acme");
        assert_eq!(
            config.repo_root,
            fs::canonicalize(temp_dir.path()).unwrap()
        );
    }

    #[test]
    fn load_reports_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("config.yaml");
        assert!(matches!(
            RepoConfig::load(&missing),
            Err(ConfigError::NotFound(_))
        ));
    }
}
