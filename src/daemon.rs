//! The long-running driver and its runtime status marker.
//!
//! The driver runs one cycle, then sleeps in short ticks until the poll
//! interval elapses, checking the stop flag on every tick. A stop request
//! never interrupts a running cycle.

use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::utils::{format_timestamp, write_atomic};

/// Granularity at which a sleeping driver notices a stop request.
pub const STOP_TICK: Duration = Duration::from_secs(1);

/// Contents of the runtime status marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Process id of the daemon.
    pub pid: u32,
    /// RFC3339 start time.
    pub started_at: String,
    /// Configuration file the daemon was started with.
    pub config_path: PathBuf,
}

/// What the status marker says about the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonState {
    /// No marker.
    Stopped,
    /// Marker present and its process is alive.
    Running {
        /// Marker contents.
        status: DaemonStatus,
        /// Time since start, if `started_at` parses.
        uptime: Option<chrono::Duration>,
    },
    /// Marker present but its process is gone.
    Stale(DaemonStatus),
}

impl DaemonState {
    /// One-line summary for `status` output.
    pub fn describe(&self) -> String {
        match self {
            Self::Stopped => "stopped".to_string(),
            Self::Running { status, uptime } => {
                let uptime = uptime.map_or_else(|| "unknown".to_string(), format_uptime);
                format!("running (pid={}, uptime={uptime})", status.pid)
            }
            Self::Stale(status) => {
                format!("stopped (stale status file for pid {})", status.pid)
            }
        }
    }
}

/// Renders a duration as `1h 02m 03s`.
pub fn format_uptime(uptime: chrono::Duration) -> String {
    let total = uptime.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

/// Reads the marker. Missing or unparsable markers read as `None`.
pub fn read_status(path: &Path) -> Option<DaemonStatus> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(status) => Some(status),
        Err(e) => {
            debug!(path = %path.display(), "Ignoring unreadable daemon status: {e}");
            None
        }
    }
}

/// Classifies the daemon from its marker at `now`.
pub fn daemon_state(path: &Path, now: DateTime<Utc>) -> DaemonState {
    let Some(status) = read_status(path) else {
        return DaemonState::Stopped;
    };
    if !pid_alive(status.pid) {
        return DaemonState::Stale(status);
    }
    let uptime = DateTime::parse_from_rfc3339(&status.started_at)
        .ok()
        .map(|started| (now - started.with_timezone(&Utc)).max(chrono::Duration::zero()));
    DaemonState::Running { status, uptime }
}

/// Whether a process with `pid` exists.
pub fn pid_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// The marker for this process. Removed when dropped.
#[derive(Debug)]
pub struct StatusMarker {
    path: PathBuf,
}

impl StatusMarker {
    /// Writes a marker for the current process.
    pub fn create(path: &Path, config_path: &Path, now: DateTime<Utc>) -> io::Result<Self> {
        let status = DaemonStatus {
            pid: std::process::id(),
            started_at: format_timestamp(now),
            config_path: config_path.to_path_buf(),
        };
        let mut body = serde_json::to_string_pretty(&status).map_err(io::Error::other)?;
        body.push('\n');
        write_atomic(path, body.as_bytes())?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Marker path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StatusMarker {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), "Failed to remove daemon status: {e}");
            }
        }
    }
}

/// Shared cooperative stop flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// A flag that is not set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Routes SIGINT and SIGTERM to this flag. Callable once per process.
    pub fn install_handler(&self) -> Result<(), ctrlc::Error> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            if !flag.is_set() {
                info!("Shutdown signal received; finishing current cycle before exit");
            }
            flag.trigger();
        })
    }
}

/// Interval loop around a cycle function.
#[derive(Debug, Clone)]
pub struct Driver {
    interval: Duration,
    tick: Duration,
}

impl Driver {
    /// A driver that waits `interval` between cycles.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            tick: STOP_TICK,
        }
    }

    /// Overrides the stop-check granularity.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Runs `cycle` until `stop` is set. Returns the number of cycles run.
    pub async fn run<F, Fut>(&self, stop: &StopSignal, mut cycle: F) -> usize
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut cycles = 0;
        while !stop.is_set() {
            cycle().await;
            cycles += 1;
            if stop.is_set() {
                break;
            }
            self.sleep(stop).await;
        }
        cycles
    }

    async fn sleep(&self, stop: &StopSignal) {
        let mut remaining = self.interval;
        while !remaining.is_zero() && !stop.is_set() {
            let step = remaining.min(self.tick);
            tokio::time::sleep(step).await;
            remaining = remaining.saturating_sub(step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn driver_stops_after_cycle_that_requests_it() {
        let stop = StopSignal::new();
        let driver = Driver::new(Duration::from_millis(5)).with_tick(Duration::from_millis(1));
        let mut seen = 0;

        let cycles = driver
            .run(&stop, || {
                seen += 1;
                if seen == 3 {
                    stop.trigger();
                }
                async {}
            })
            .await;

        assert_eq!(cycles, 3);
    }

    #[tokio::test]
    async fn stop_during_sleep_ends_before_interval() {
        let stop = StopSignal::new();
        let driver = Driver::new(Duration::from_secs(3600)).with_tick(Duration::from_millis(5));
        let trigger = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.trigger();
        });

        let cycles = tokio::time::timeout(Duration::from_secs(5), driver.run(&stop, || async {}))
            .await
            .unwrap();
        assert_eq!(cycles, 1);
    }

    #[tokio::test]
    async fn preset_stop_runs_nothing() {
        let stop = StopSignal::new();
        stop.trigger();
        let cycles = Driver::new(Duration::from_secs(1)).run(&stop, || async {}).await;
        assert_eq!(cycles, 0);
    }

    #[test]
    fn marker_is_written_and_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.json");
        let now = Utc::now();

        let marker = StatusMarker::create(&path, Path::new("/repo/.shipnote/config.yaml"), now)
            .unwrap();
        let status = read_status(marker.path()).unwrap();
        assert_eq!(status.pid, std::process::id());
        assert_eq!(status.config_path, PathBuf::from("/repo/.shipnote/config.yaml"));

        match daemon_state(&path, now + chrono::Duration::seconds(90)) {
            DaemonState::Running { uptime, .. } => {
                assert_eq!(uptime, Some(chrono::Duration::seconds(90)));
            }
            other => panic!("expected running, got {other:?}"),
        }

        drop(marker);
        assert!(!path.exists());
        assert_eq!(daemon_state(&path, now), DaemonState::Stopped);
    }

    #[test]
    fn dead_pid_is_stale_and_garbage_is_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.json");
        fs::write(
            &path,
            r#"{"pid": 4294967, "started_at": "2026-10-18T00:00:00Z", "config_path": "/x"}"#,
        )
        .unwrap();
        let state = daemon_state(&path, Utc::now());
        assert!(matches!(state, DaemonState::Stale(_)));
        assert!(state.describe().contains("stale"));

        fs::write(&path, "not json").unwrap();
        assert_eq!(daemon_state(&path, Utc::now()), DaemonState::Stopped);
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(chrono::Duration::seconds(5)), "5s");
        assert_eq!(format_uptime(chrono::Duration::seconds(125)), "2m 05s");
        assert_eq!(format_uptime(chrono::Duration::seconds(3723)), "1h 02m 03s");
    }
}
