//! Check command: validates everything a cycle needs, without running one.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use crate::ai::client_from_secrets;
use crate::config::secrets::SecretsMode;
use crate::git::{CommitSource, GitRepository};
use crate::runner::{load_config, load_secrets};
use crate::templates::TemplateCatalog;

/// Check command options.
#[derive(Parser)]
pub struct CheckCommand {}

impl CheckCommand {
    /// Executes the check command. The first hard failure is returned as an error.
    pub fn execute(self, config: Option<&Path>) -> Result<()> {
        let config = load_config(config)?;
        println!("config: OK ({})", config.config_path.display());

        let repo = GitRepository::open_at(&config.repo_root)
            .context("Repository check failed")?;
        println!("git_repo: OK ({})", config.repo_root.display());
        println!("branch: {}", repo.branch_name()?);

        let secrets = load_secrets(SecretsMode::Required)?;
        println!("secrets: OK ({})", secrets.path.display());
        if secrets.permissions_ok() {
            println!("secrets_permissions: OK");
        } else {
            println!(
                "secrets_permissions: WARN ({}) expected 0o600",
                secrets.mode_octal()
            );
        }

        let client = client_from_secrets(&secrets).context("AI client check failed")?;
        let metadata = client.get_metadata();
        println!("provider: {} ({})", metadata.provider, metadata.model);

        let catalog = TemplateCatalog::load(&config.template_dir)?;
        println!("templates: OK ({} files)", catalog.len());
        let missing = catalog.missing_standard();
        if missing.is_empty() {
            println!("templates_standard: OK");
        } else {
            println!("templates_standard: WARN (missing: {})", missing.join(", "));
        }
        Ok(())
    }
}
