//! Commit significance heuristics.
//!
//! Rules are applied in order and the first match wins: a skip-pattern
//! message rejects the commit regardless of how many files it touches.

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::{Regex, RegexBuilder};

/// Outcome of [`SkipRules::should_keep`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDecision {
    /// Whether the commit should be forwarded to generation.
    pub keep: bool,
    /// Human-readable explanation, suitable for logs.
    pub reason: String,
}

/// Compiled skip rules.
#[derive(Debug, Clone)]
pub struct SkipRules {
    messages: Vec<(String, Regex)>,
    files_only: GlobSet,
    min_meaningful_files: usize,
}

/// Errors compiling skip rules.
#[derive(Debug, thiserror::Error)]
pub enum SkipRuleError {
    /// A message pattern is not a valid regex.
    #[error("invalid skip message pattern '{pattern}': {source}")]
    Message {
        /// The offending pattern.
        pattern: String,
        /// Regex compile error.
        source: regex::Error,
    },

    /// A file pattern is not a valid glob.
    #[error("invalid files_only pattern '{pattern}': {source}")]
    File {
        /// The offending pattern.
        pattern: String,
        /// Glob compile error.
        source: globset::Error,
    },
}

impl SkipRules {
    /// Compiles message regexes (case-insensitive) and file globs.
    pub fn new(
        messages: &[String],
        files_only: &[String],
        min_meaningful_files: usize,
    ) -> Result<Self, SkipRuleError> {
        let messages = messages
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (pattern.clone(), re))
                    .map_err(|source| SkipRuleError::Message {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = GlobSetBuilder::new();
        for pattern in files_only {
            let glob = Glob::new(pattern).map_err(|source| SkipRuleError::File {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let files_only = builder.build().map_err(|source| SkipRuleError::File {
            pattern: files_only.join(", "),
            source,
        })?;

        Ok(Self {
            messages,
            files_only,
            min_meaningful_files,
        })
    }

    /// Classifies a commit by its message and changed files.
    pub fn should_keep(&self, message: &str, changed_files: &[String]) -> FilterDecision {
        if let Some((pattern, _)) = self.messages.iter().find(|(_, re)| re.is_match(message)) {
            return FilterDecision {
                keep: false,
                reason: format!("message matched skip pattern '{pattern}'"),
            };
        }

        let meaningful = changed_files
            .iter()
            .filter(|path| !self.files_only.is_match(path.as_str()))
            .count();
        if meaningful < self.min_meaningful_files {
            return FilterDecision {
                keep: false,
                reason: format!(
                    "insufficient meaningful files ({meaningful} < {})",
                    self.min_meaningful_files
                ),
            };
        }

        FilterDecision {
            keep: true,
            reason: format!("kept ({meaningful} meaningful file(s))"),
        }
    }
}
