//! Init command: scaffolds `.shipnote/` in the current repository.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use crate::scaffold::{bootstrap, BootstrapOptions, BootstrapReport};

/// Init command options.
#[derive(Parser)]
pub struct InitCommand {
    /// Overwrite existing config and templates.
    #[arg(long)]
    pub force: bool,
}

/// One-word summary of what happened to the config file.
pub(crate) fn config_status(report: &BootstrapReport) -> &'static str {
    if report.created_config {
        "created"
    } else if report.updated_config {
        "updated"
    } else {
        "unchanged"
    }
}

/// Prints the bootstrap summary lines shared by `init` and `launch`.
pub(crate) fn print_report(report: &BootstrapReport) {
    if report.git_initialized {
        println!("git: initialized");
    }
    println!(
        "config: {} ({})",
        config_status(report),
        report.config_path.display()
    );
    println!("templates_written: {}", report.templates_written);
}

impl InitCommand {
    /// Executes the init command. The global `--config` flag is not used.
    pub fn execute(self, _config: Option<&Path>) -> Result<()> {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        let report = bootstrap(
            &cwd,
            &BootstrapOptions {
                poll_interval_seconds: 60,
                force: self.force,
                ..BootstrapOptions::default()
            },
        )
        .with_context(|| format!("Failed to initialize shipnote in {}", cwd.display()))?;
        print_report(&report);
        println!("next: shipnote check --config {}", report.config_path.display());
        Ok(())
    }
}
