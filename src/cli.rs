//! CLI interface for shipnote.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod check;
pub mod init;
pub mod launch;
pub mod reset;
pub mod run_once;
pub mod start;
pub mod status;

/// shipnote: turns significant commits into queued post drafts.
#[derive(Parser)]
#[command(name = "shipnote")]
#[command(about = "Polls a git repository and queues social drafts for significant commits", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: discovered `.shipnote/config.yaml` above the current directory).
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Runs the polling daemon until interrupted.
    Start(start::StartCommand),
    /// Runs a single poll cycle and exits.
    #[command(name = "run-once")]
    RunOnce(run_once::RunOnceCommand),
    /// Shows daemon and pipeline state.
    Status(status::StatusCommand),
    /// Resets pipeline state to the current HEAD.
    Reset(reset::ResetCommand),
    /// Validates config, repository, secrets and templates.
    Check(check::CheckCommand),
    /// Writes the default config and standard templates into the current repository.
    Init(init::InitCommand),
    /// Bootstraps a repository, checks it and starts the daemon.
    Launch(launch::LaunchCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        let config = self.config.as_deref();
        match self.command {
            Commands::Start(cmd) => cmd.execute(config).await,
            Commands::RunOnce(cmd) => cmd.execute(config).await,
            Commands::Status(cmd) => cmd.execute(config),
            Commands::Reset(cmd) => cmd.execute(config),
            Commands::Check(cmd) => cmd.execute(config),
            Commands::Init(cmd) => cmd.execute(config),
            Commands::Launch(cmd) => cmd.execute().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["shipnote", "run-once", "--config", "/r/.shipnote/config.yaml"])
            .unwrap();
        assert!(matches!(cli.command, Commands::RunOnce(_)));
        assert_eq!(cli.config, Some(PathBuf::from("/r/.shipnote/config.yaml")));
    }

    #[test]
    fn parses_launch_options() {
        let cli = Cli::try_parse_from([
            "shipnote",
            "launch",
            "--repo",
            "/r",
            "--poll-interval",
            "30",
            "--init-git",
        ])
        .unwrap();
        let Commands::Launch(cmd) = cli.command else {
            panic!("expected launch");
        };
        assert_eq!(cmd.repo, Some(PathBuf::from("/r")));
        assert_eq!(cmd.poll_interval, 30);
        assert!(cmd.init_git);
        assert!(!cmd.force);
    }

    #[test]
    fn init_accepts_force() {
        let cli = Cli::try_parse_from(["shipnote", "init", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Init(init::InitCommand { force: true })));
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(Cli::try_parse_from(["shipnote", "chat"]).is_err());
    }
}
