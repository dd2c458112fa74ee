//! Wiring between configuration, secrets, the lock, the repository and the
//! engine. Everything here returns `anyhow::Result` for the CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::ai::client_from_secrets;
use crate::config::secrets::{Secrets, SecretsMode};
use crate::config::{RepoConfig, RUNTIME_LOCK};
use crate::daemon::{Driver, StatusMarker, StopSignal};
use crate::engine::{CycleReport, PollEngine, DEFAULT_RETRY_DELAY};
use crate::generation::{AiDraftGenerator, DraftGenerator};
use crate::git::{CommitSource, GitRepository};
use crate::lock::{FileLockManager, LockManager};
use crate::state::{self, PipelineState};
use crate::templates::TemplateCatalog;

/// Uses `explicit` when given, otherwise discovers the config from the cwd.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    Ok(RepoConfig::discover(&cwd)?)
}

/// Loads and validates the repository config.
pub fn load_config(explicit: Option<&Path>) -> Result<RepoConfig> {
    let path = resolve_config_path(explicit)?;
    RepoConfig::load(&path).with_context(|| format!("Failed to load config {}", path.display()))
}

/// Loads the secrets file and warns about loose permissions.
pub fn load_secrets(mode: SecretsMode) -> Result<Secrets> {
    let secrets = Secrets::load(mode)?;
    if !secrets.permissions_ok() {
        warn!(
            path = %secrets.path.display(),
            "Secrets file permissions are {}; expected 0o600",
            secrets.mode_octal()
        );
    }
    Ok(secrets)
}

/// Loads templates and warns about missing standard ones.
pub fn load_templates(config: &RepoConfig) -> Result<TemplateCatalog> {
    let catalog = TemplateCatalog::load(&config.template_dir)?;
    let missing = catalog.missing_standard();
    if !missing.is_empty() {
        warn!("Missing standard templates: {}", missing.join(", "));
    }
    Ok(catalog)
}

/// A configured repository ready to run cycles.
pub struct Runner {
    config: RepoConfig,
    generator: Box<dyn DraftGenerator>,
    locks: FileLockManager,
    retry_delay: Duration,
}

impl Runner {
    /// Creates the runtime directories. The repository is opened per cycle.
    pub fn new(config: RepoConfig, generator: Box<dyn DraftGenerator>) -> Result<Self> {
        config.ensure_runtime_dirs().with_context(|| {
            format!("Failed to create runtime directories under {}", config.shipnote_dir.display())
        })?;
        Ok(Self {
            locks: FileLockManager::new(&config.shipnote_dir),
            config,
            generator,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Creates a runner whose generator talks to the provider in `secrets`.
    pub fn with_secrets(config: RepoConfig, secrets: &Secrets) -> Result<Self> {
        let client = client_from_secrets(secrets).context("Failed to create AI client")?;
        let generator = AiDraftGenerator::new(client, config.clone());
        Self::new(config, Box::new(generator))
    }

    /// Overrides the pause before a generation retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Repository configuration.
    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Runs one cycle under the runtime lock with freshly loaded templates.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _lock = self
            .locks
            .acquire(RUNTIME_LOCK)
            .context("Failed to acquire runtime lock")?;
        let source = match GitRepository::open_at(&self.config.repo_root) {
            Ok(source) => source,
            Err(e) => {
                warn!("Repository unavailable: {e}");
                return Ok(CycleReport::unavailable(e.to_string()));
            }
        };
        let catalog = load_templates(&self.config)?;
        let engine = PollEngine::new(&self.config, &source, self.generator.as_ref())?
            .with_retry_delay(self.retry_delay);
        Ok(engine.run_cycle(&catalog).await)
    }

    /// Loops cycles until `stop` is set. Cycle errors are logged, never fatal.
    pub async fn run_daemon(&self, stop: &StopSignal) -> Result<usize> {
        let _marker = StatusMarker::create(
            &self.config.status_path(),
            &self.config.config_path,
            Utc::now(),
        )
        .context("Failed to write daemon status")?;

        info!(
            repo = %self.config.repo_root.display(),
            interval = self.config.poll_interval_seconds,
            "Daemon start"
        );

        let driver = Driver::new(Duration::from_secs(self.config.poll_interval_seconds));
        let cycles = driver
            .run(stop, move || async move {
                if let Err(e) = self.run_cycle().await {
                    error!("Poll cycle failed: {e:#}");
                }
            })
            .await;

        info!(cycles, "Daemon stopped gracefully");
        Ok(cycles)
    }
}

/// Resets state under the runtime lock with the cursor at the current HEAD.
pub fn reset_state(config: &RepoConfig) -> Result<PipelineState> {
    let source = GitRepository::open_at(&config.repo_root)?;
    let locks = FileLockManager::new(&config.shipnote_dir);
    let _lock = locks
        .acquire(RUNTIME_LOCK)
        .context("Failed to acquire runtime lock")?;
    let head = source.head_id()?;
    Ok(state::reset(&config.state_path(), head)?)
}

/// Runs a single cycle. A missing secrets file only warns here; a missing
/// provider key is still an error.
pub async fn run_once(explicit: Option<&Path>) -> Result<CycleReport> {
    let config = load_config(explicit)?;
    let secrets = match load_secrets(SecretsMode::Required) {
        Ok(secrets) => secrets,
        Err(e) => {
            warn!("{e:#}");
            load_secrets(SecretsMode::Optional)?
        }
    };
    Runner::with_secrets(config, &secrets)?.run_cycle().await
}

/// Runs the daemon until SIGINT or SIGTERM.
pub async fn start(explicit: Option<&Path>) -> Result<()> {
    let config = load_config(explicit)?;
    let secrets = load_secrets(SecretsMode::Required)?;
    let runner = Runner::with_secrets(config, &secrets)?;

    let stop = StopSignal::new();
    stop.install_handler()
        .context("Failed to install signal handler")?;
    runner.run_daemon(&stop).await?;
    Ok(())
}
