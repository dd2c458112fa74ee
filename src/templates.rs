//! Markdown templates the generation service chooses from.
//!
//! Every `*.md` file in the template directory is one template. Each starts
//! with a `---` delimited YAML frontmatter block that names the template and
//! its content type; the rest of the file is the body shown to the model.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::ConfigError;

/// Template names every repository is expected to provide.
pub const STANDARD_TEMPLATES: [&str; 6] = [
    "authority",
    "translation",
    "personal",
    "growth",
    "thread",
    "weekly_wrapup",
];

/// One loaded template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    /// File name, e.g. `authority.md`.
    pub filename: String,
    /// Template name from frontmatter.
    pub name: String,
    /// Content type from frontmatter.
    pub content_type: String,
    /// Remaining frontmatter keys, rendered as strings.
    pub frontmatter: BTreeMap<String, String>,
    /// Markdown after the frontmatter block.
    pub body: String,
}

/// All templates in a directory, in file name order.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    dir: PathBuf,
    templates: Vec<Template>,
}

fn template_error(path: &Path, message: impl Into<String>) -> ConfigError {
    ConfigError::Template {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn scalar_text(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Splits a template into frontmatter and body and validates required keys.
pub fn parse_template(path: &Path, raw: &str) -> Result<Template, ConfigError> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let mut lines = raw.lines();
    if lines.next().map(str::trim) != Some("---") {
        return Err(template_error(path, "missing YAML frontmatter"));
    }

    let mut header = Vec::new();
    let mut closed = false;
    for line in lines.by_ref() {
        if line.trim() == "---" {
            closed = true;
            break;
        }
        header.push(line);
    }
    if !closed {
        return Err(template_error(path, "unclosed YAML frontmatter"));
    }
    let body = lines.collect::<Vec<_>>().join("\n");
    let body = body.trim_start_matches('\n').to_string();

    let header = header.join("\n");
    let mapping: serde_yaml::Mapping = if header.trim().is_empty() {
        serde_yaml::Mapping::new()
    } else {
        serde_yaml::from_str(&header)
            .map_err(|e| template_error(path, format!("invalid frontmatter: {e}")))?
    };

    let mut frontmatter: BTreeMap<String, String> = mapping
        .iter()
        .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), scalar_text(v))))
        .collect();

    let content_type = frontmatter
        .remove("content_type")
        .ok_or_else(|| template_error(path, "frontmatter missing 'content_type'"))?;
    let name = frontmatter
        .remove("name")
        .ok_or_else(|| template_error(path, "frontmatter missing 'name'"))?;

    Ok(Template {
        filename,
        name,
        content_type,
        frontmatter,
        body,
    })
}

impl TemplateCatalog {
    /// Loads every `*.md` file in `dir`.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        if !dir.is_dir() {
            return Err(template_error(dir, "template directory not found"));
        }

        let entries = fs::read_dir(dir).map_err(|source| ConfigError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "md"))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(template_error(dir, "template directory is empty"));
        }

        let templates = paths
            .iter()
            .map(|path| {
                let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                parse_template(path, &raw)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            dir: dir.to_path_buf(),
            templates,
        })
    }

    /// Builds a catalog from already-parsed templates.
    pub fn from_templates(dir: impl Into<PathBuf>, templates: Vec<Template>) -> Self {
        Self {
            dir: dir.into(),
            templates,
        }
    }

    /// Directory the catalog was loaded from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Templates in file name order.
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// True when no templates are loaded.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Standard template files that are absent.
    pub fn missing_standard(&self) -> Vec<String> {
        STANDARD_TEMPLATES
            .iter()
            .map(|name| format!("{name}.md"))
            .filter(|file| !self.templates.iter().any(|t| &t.filename == file))
            .collect()
    }
}
