//! Launch command: bootstrap, check, then run the daemon.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use super::check::CheckCommand;
use super::init::print_report;
use crate::scaffold::{bootstrap, BootstrapOptions};

/// Launch command options.
#[derive(Parser)]
pub struct LaunchCommand {
    /// Repository to run in (default: current directory).
    #[arg(long, value_name = "PATH")]
    pub repo: Option<PathBuf>,

    /// Project name written to a new config.
    #[arg(long)]
    pub project_name: Option<String>,

    /// Project description written to a new config.
    #[arg(long)]
    pub project_description: Option<String>,

    /// Voice description written to a new config.
    #[arg(long)]
    pub voice_description: Option<String>,

    /// Poll interval in seconds written to a new config.
    #[arg(long, default_value_t = 60)]
    pub poll_interval: u64,

    /// Overwrite existing config and templates.
    #[arg(long)]
    pub force: bool,

    /// Run `git init` when the target is not a repository yet.
    #[arg(long)]
    pub init_git: bool,
}

impl LaunchCommand {
    /// Executes the launch command.
    pub async fn execute(self) -> Result<()> {
        let repo = match self.repo {
            Some(path) => path,
            None => std::env::current_dir().context("Failed to determine current directory")?,
        };
        let report = bootstrap(
            &repo,
            &BootstrapOptions {
                project_name: self.project_name,
                project_description: self.project_description,
                voice_description: self.voice_description,
                poll_interval_seconds: self.poll_interval,
                force: self.force,
                init_git: self.init_git,
            },
        )
        .with_context(|| format!("Failed to bootstrap {}", repo.display()))?;
        print_report(&report);

        CheckCommand {}.execute(Some(&report.config_path))?;
        println!("launch: starting daemon loop (Ctrl+C to stop)");
        crate::runner::start(Some(&report.config_path)).await
    }
}
