//! Provider credentials from `~/.shipnote/secrets.env`.
//!
//! Values in the process environment take precedence over the file.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment keys that select a generation provider.
pub const PROVIDER_API_KEYS: [&str; 2] = ["ANTHROPIC_API_KEY", "OPENAI_API_KEY"];

/// Whether a provider key must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretsMode {
    /// Daemon start and one-shot runs that will call the provider.
    Required,
    /// Status and check commands.
    Optional,
}

/// Secrets loading errors.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// The home directory could not be determined.
    #[error("failed to determine home directory")]
    NoHome,

    /// The secrets file is absent.
    #[error("secrets file missing: {0}. Create ~/.shipnote/secrets.env")]
    Missing(PathBuf),

    /// The secrets path is a directory or special file.
    #[error("secrets path is not a file: {0}")]
    NotAFile(PathBuf),

    /// The secrets file could not be read.
    #[error("failed to read secrets file {path}: {source}")]
    Read {
        /// Secrets file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Neither provider key is available.
    #[error("missing provider API key in {path}. Add one of: {}", PROVIDER_API_KEYS.join(", "))]
    NoProviderKey {
        /// Secrets file that was consulted.
        path: PathBuf,
    },
}

/// Parsed secrets file.
#[derive(Debug, Clone)]
pub struct Secrets {
    /// File the values were read from.
    pub path: PathBuf,
    values: BTreeMap<String, String>,
    /// Unix permission bits, when the file exists.
    pub mode: Option<u32>,
}

impl Secrets {
    /// Default location: `~/.shipnote/secrets.env`.
    pub fn default_path() -> Result<PathBuf, SecretsError> {
        let home = dirs::home_dir().ok_or(SecretsError::NoHome)?;
        Ok(home.join(".shipnote").join("secrets.env"))
    }

    /// Loads the default secrets file.
    pub fn load(mode: SecretsMode) -> Result<Self, SecretsError> {
        Self::load_from(&Self::default_path()?, mode)
    }

    /// Loads secrets from `path`.
    pub fn load_from(path: &Path, mode: SecretsMode) -> Result<Self, SecretsError> {
        let secrets = Self::read(path)?;
        if mode == SecretsMode::Required {
            if !path.exists() && secrets.provider_key().is_none() {
                return Err(SecretsError::Missing(path.to_path_buf()));
            }
            if secrets.provider_key().is_none() {
                return Err(SecretsError::NoProviderKey {
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(secrets)
    }

    fn read(path: &Path) -> Result<Self, SecretsError> {
        if !path.exists() {
            return Ok(Self {
                path: path.to_path_buf(),
                values: BTreeMap::new(),
                mode: None,
            });
        }
        if !path.is_file() {
            return Err(SecretsError::NotAFile(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| SecretsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let metadata = fs::metadata(path).map_err(|source| SecretsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            values: parse_env_file(&content),
            mode: permission_bits(&metadata),
        })
    }

    /// Looks up a value, preferring the process environment.
    pub fn get(&self, key: &str) -> Option<String> {
        env::var(key)
            .ok()
            .filter(|value| !value.is_empty())
            .or_else(|| self.values.get(key).filter(|v| !v.is_empty()).cloned())
    }

    /// The first provider key that has a value, with its name.
    pub fn provider_key(&self) -> Option<(&'static str, String)> {
        PROVIDER_API_KEYS
            .iter()
            .find_map(|key| self.get(key).map(|value| (*key, value)))
    }

    /// Keys defined in the file.
    pub fn file_keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// True when the file is owner read/write only, or absent.
    pub fn permissions_ok(&self) -> bool {
        self.mode.map_or(true, |mode| mode == 0o600)
    }

    /// Octal rendering of the permission bits for diagnostics.
    pub fn mode_octal(&self) -> String {
        self.mode
            .map_or_else(|| "-".to_string(), |mode| format!("{mode:o}"))
    }
}

#[cfg(unix)]
fn permission_bits(metadata: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn permission_bits(_metadata: &fs::Metadata) -> Option<u32> {
    None
}

fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && bytes[0] == bytes[bytes.len() - 1]
        && matches!(bytes[0], b'"' | b'\'')
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Cuts a trailing `# comment` that is not inside quotes.
fn strip_inline_comment(line: &str) -> &str {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '#' if !in_single && !in_double => return line[..idx].trim_end(),
            _ => {}
        }
    }
    line.trim_end()
}

/// Parses `KEY=VALUE` lines; blank lines and comments are ignored.
pub(crate) fn parse_env_file(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| {
            let raw = strip_inline_comment(line.trim());
            let (key, value) = raw.split_once('=')?;
            let key = key.trim().trim_start_matches("export ").trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), strip_quotes(value.trim()).to_string()))
        })
        .collect()
}
