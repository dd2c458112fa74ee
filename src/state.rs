//! Durable pipeline state: cursor, dedup window and weekly ledger.
//!
//! The state file is a single JSON object written with sorted keys. Loading
//! never trusts a damaged file partially: anything that does not normalize
//! cleanly yields a fresh default state flagged as recovered.

pub mod dedup;
pub mod ledger;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use dedup::{DedupWindow, MAX_PROCESSED_COMMITS};
pub use ledger::{
    CategoryCounts, ContentCategory, ContentLedger, DraftSummary, MAX_RECENT_DRAFTS,
};

use crate::utils::{format_timestamp, write_atomic};

/// File name of the state file inside the pipeline directory.
pub const STATE_FILE: &str = "state.json";

/// State persistence errors.
#[derive(Error, Debug)]
pub enum StateError {
    /// The state could not be serialized.
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The state file could not be written.
    #[error("failed to save state at {path}: {source}")]
    Write {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Reasons a stored state file is rejected.
#[derive(Error, Debug)]
enum Corruption {
    #[error("unreadable: {0}")]
    Io(#[from] io::Error),
    #[error("malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state root must be an object")]
    NotAnObject,
    #[error("invalid last_run_timestamp '{0}'")]
    Timestamp(String),
    #[error("invalid week_start '{0}'")]
    WeekStart(String),
}

/// Returns the state file path for a pipeline directory.
pub fn state_path(pipeline_dir: &Path) -> PathBuf {
    pipeline_dir.join(STATE_FILE)
}

/// The durable pipeline ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineState {
    /// Last commit considered processed; discovery starts strictly after it.
    pub cursor: Option<String>,
    /// Number of queue files ever written.
    pub queue_counter: u64,
    /// Time of the last completed checkpoint.
    pub last_cycle: DateTime<Utc>,
    /// Recently processed commit ids.
    pub dedup_window: DedupWindow,
    /// Weekly content bookkeeping.
    pub ledger: ContentLedger,
}

impl PipelineState {
    /// Creates the default state at `now`.
    pub fn new(cursor: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            cursor,
            queue_counter: 0,
            last_cycle: truncate_to_seconds(now),
            dedup_window: DedupWindow::new(),
            ledger: ContentLedger::new(now.date_naive()),
        }
    }

    /// Records `commit_id` as processed: advances the cursor, refreshes the
    /// timestamp and remembers the id.
    pub fn mark_processed(&mut self, commit_id: &str, now: DateTime<Utc>) {
        self.cursor = Some(commit_id.to_string());
        self.touch(now);
        self.dedup_window.insert(commit_id);
    }

    /// Refreshes the last-cycle timestamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_cycle = truncate_to_seconds(now);
    }

    /// Applies bounds and the weekly rollover for `today`.
    ///
    /// Returns true when the ledger rolled over. Normalizing an already
    /// normalized state for the same week changes nothing.
    pub fn normalize(&mut self, today: NaiveDate) -> bool {
        self.last_cycle = truncate_to_seconds(self.last_cycle);
        self.ledger.truncate_recent();
        self.ledger.roll_over(today)
    }
}

fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}

/// Result of [`load`].
#[derive(Debug, Clone)]
pub struct LoadedState {
    /// The normalized state.
    pub state: PipelineState,
    /// True when the file was missing or rejected and defaults were used.
    pub recovered: bool,
    /// True when the weekly ledger rolled over during load.
    pub rolled_over: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLedger {
    recent_drafts: Vec<DraftSummary>,
    category_counts_this_week: BTreeMap<String, i64>,
    saveable_this_week: i64,
    week_start: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawState {
    last_commit_sha: Option<String>,
    queue_counter: i64,
    last_run_timestamp: Option<String>,
    processed_commits: Vec<String>,
    content_ledger: RawLedger,
}

#[derive(Serialize)]
struct LedgerFile<'a> {
    recent_drafts: &'a [DraftSummary],
    category_counts_this_week: &'a CategoryCounts,
    saveable_this_week: u64,
    week_start: String,
}

#[derive(Serialize)]
struct StateFile<'a> {
    last_commit_sha: Option<&'a str>,
    queue_counter: u64,
    last_run_timestamp: String,
    processed_commits: &'a DedupWindow,
    content_ledger: LedgerFile<'a>,
}

fn clamp(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn normalize_raw(raw: RawState, now: DateTime<Utc>) -> Result<(PipelineState, bool), Corruption> {
    let today = now.date_naive();
    let last_cycle = match raw.last_run_timestamp {
        Some(text) => DateTime::parse_from_rfc3339(&text)
            .map_err(|_| Corruption::Timestamp(text.clone()))?
            .with_timezone(&Utc),
        None => now,
    };

    let ledger_raw = raw.content_ledger;
    let week_start = match ledger_raw.week_start {
        Some(text) => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map_err(|_| Corruption::WeekStart(text.clone()))?,
        None => crate::utils::week_start(today),
    };

    let mut category_counts = CategoryCounts::default();
    for category in ContentCategory::ALL {
        let stored = ledger_raw
            .category_counts_this_week
            .get(category.as_str())
            .copied()
            .unwrap_or(0);
        *category_counts.get_mut(category) = clamp(stored);
    }

    let mut state = PipelineState {
        cursor: raw.last_commit_sha.filter(|sha| !sha.is_empty()),
        queue_counter: clamp(raw.queue_counter),
        last_cycle,
        dedup_window: DedupWindow::from_ids(raw.processed_commits),
        ledger: ContentLedger {
            recent_drafts: ledger_raw.recent_drafts,
            category_counts,
            saveable_count: clamp(ledger_raw.saveable_this_week),
            week_start,
        },
    };
    let rolled_over = state.normalize(today);
    Ok((state, rolled_over))
}

fn parse_state(bytes: &[u8], now: DateTime<Utc>) -> Result<(PipelineState, bool), Corruption> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    if !value.is_object() {
        return Err(Corruption::NotAnObject);
    }
    let raw: RawState = serde_json::from_value(value)?;
    normalize_raw(raw, now)
}

/// Loads the state file using the current time.
pub fn load(path: &Path) -> LoadedState {
    load_at(path, Utc::now())
}

/// Loads the state file as of `now`.
///
/// A missing or rejected file yields a default state with `recovered` set.
pub fn load_at(path: &Path, now: DateTime<Utc>) -> LoadedState {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return LoadedState {
                state: PipelineState::new(None, now),
                recovered: true,
                rolled_over: false,
            };
        }
        Err(e) => return rejected(path, &Corruption::Io(e), now),
    };

    match parse_state(&bytes, now) {
        Ok((state, rolled_over)) => LoadedState {
            state,
            recovered: false,
            rolled_over,
        },
        Err(reason) => rejected(path, &reason, now),
    }
}

fn rejected(path: &Path, reason: &Corruption, now: DateTime<Utc>) -> LoadedState {
    debug!(path = %path.display(), "Rejecting state file: {reason}");
    LoadedState {
        state: PipelineState::new(None, now),
        recovered: true,
        rolled_over: false,
    }
}

/// Serializes a normalized copy of `state` with sorted keys.
pub fn render(state: &PipelineState, today: NaiveDate) -> Result<String, StateError> {
    let mut normalized = state.clone();
    normalized.normalize(today);

    let file = StateFile {
        last_commit_sha: normalized.cursor.as_deref(),
        queue_counter: normalized.queue_counter,
        last_run_timestamp: format_timestamp(normalized.last_cycle),
        processed_commits: &normalized.dedup_window,
        content_ledger: LedgerFile {
            recent_drafts: &normalized.ledger.recent_drafts,
            category_counts_this_week: &normalized.ledger.category_counts,
            saveable_this_week: normalized.ledger.saveable_count,
            week_start: normalized.ledger.week_start.format("%Y-%m-%d").to_string(),
        },
    };
    // Round-trip through Value so object keys come out sorted.
    let value = serde_json::to_value(&file)?;
    let mut text = serde_json::to_string_pretty(&value)?;
    text.push('\n');
    Ok(text)
}

/// Normalizes and atomically persists `state`.
pub fn save(path: &Path, state: &PipelineState) -> Result<(), StateError> {
    save_at(path, state, Utc::now())
}

/// [`save`] with an explicit clock.
pub fn save_at(path: &Path, state: &PipelineState, now: DateTime<Utc>) -> Result<(), StateError> {
    let text = render(state, now.date_naive())?;
    write_atomic(path, text.as_bytes()).map_err(|source| StateError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Replaces the state with defaults carrying `cursor` and persists it.
pub fn reset(path: &Path, cursor: Option<String>) -> Result<PipelineState, StateError> {
    let state = PipelineState::new(cursor, Utc::now());
    save(path, &state)?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    fn summary(n: u64) -> DraftSummary {
        DraftSummary {
            queue_number: n,
            commit_sha: format!("sha{n}"),
            template_type: "translation".to_string(),
            content_category: "AI-Curious Builder".to_string(),
            generated_at: "2026-10-14T10:00:00Z".to_string(),
            is_thread: false,
        }
    }

    #[test]
    fn missing_file_is_recovered_without_rollover() {
        let temp_dir = tempfile::tempdir().unwrap();
        let loaded = load_at(&state_path(temp_dir.path()), at(2026, 10, 14));
        assert!(loaded.recovered);
        assert!(!loaded.rolled_over);
        assert_eq!(loaded.state.cursor, None);
        assert_eq!(
            loaded.state.ledger.week_start,
            NaiveDate::from_ymd_opt(2026, 10, 12).unwrap()
        );
    }

    #[test]
    fn save_then_load_is_a_fixed_point() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = state_path(temp_dir.path());
        let now = at(2026, 10, 14);

        let mut state = PipelineState::new(Some("abc".to_string()), now);
        state.queue_counter = 7;
        state.mark_processed("def", now);
        state.ledger.record_template("translation");
        state.ledger.push_recent(summary(7));

        save_at(&path, &state, now).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        let loaded = load_at(&path, now);
        assert!(!loaded.recovered);
        assert!(!loaded.rolled_over);
        assert_eq!(loaded.state, state);

        save_at(&path, &loaded.state, now).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn saved_keys_are_sorted() {
        let state = PipelineState::new(Some("abc".to_string()), at(2026, 10, 14));
        let text = render(&state, at(2026, 10, 14).date_naive()).unwrap();
        let positions: Vec<usize> = [
            "\"content_ledger\"",
            "\"last_commit_sha\"",
            "\"last_run_timestamp\"",
            "\"processed_commits\"",
            "\"queue_counter\"",
        ]
        .iter()
        .map(|key| text.find(key).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn non_object_root_is_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = state_path(temp_dir.path());
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(load_at(&path, at(2026, 10, 14)).recovered);

        fs::write(&path, "{ not json").unwrap();
        assert!(load_at(&path, at(2026, 10, 14)).recovered);
    }

    #[test]
    fn wrongly_typed_field_triggers_full_reset() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = state_path(temp_dir.path());
        fs::write(
            &path,
            r#"{"last_commit_sha": "abc", "queue_counter": "many", "processed_commits": ["abc"]}"#,
        )
        .unwrap();
        let loaded = load_at(&path, at(2026, 10, 14));
        assert!(loaded.recovered);
        assert_eq!(loaded.state.cursor, None);
        assert!(loaded.state.dedup_window.is_empty());
    }

    #[test]
    fn bad_week_start_triggers_full_reset() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = state_path(temp_dir.path());
        fs::write(
            &path,
            r#"{"last_commit_sha": "abc", "content_ledger": {"week_start": "last tuesday"}}"#,
        )
        .unwrap();
        assert!(load_at(&path, at(2026, 10, 14)).recovered);
    }

    #[test]
    fn load_clamps_and_defaults_fields() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = state_path(temp_dir.path());
        fs::write(
            &path,
            r#"{
                "last_commit_sha": "abc",
                "queue_counter": -4,
                "processed_commits": ["a", "b", "a"],
                "content_ledger": {
                    "category_counts_this_week": {"authority": -2, "growth": 3, "memes": 9},
                    "week_start": "2026-10-12"
                }
            }"#,
        )
        .unwrap();
        let loaded = load_at(&path, at(2026, 10, 14));
        assert!(!loaded.recovered);
        let state = loaded.state;
        assert_eq!(state.queue_counter, 0);
        assert_eq!(state.dedup_window.iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(state.ledger.category_counts.authority, 0);
        assert_eq!(state.ledger.category_counts.growth, 3);
        assert_eq!(state.ledger.category_counts.translation, 0);
        assert_eq!(state.ledger.saveable_count, 0);
        assert!(state.ledger.recent_drafts.is_empty());
    }

    #[test]
    fn load_rolls_over_stale_week() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = state_path(temp_dir.path());
        let last_week = at(2026, 10, 8);
        let mut state = PipelineState::new(Some("abc".to_string()), last_week);
        state.ledger.record_template("authority");
        state.ledger.record_template("translation");
        save_at(&path, &state, last_week).unwrap();

        let same_week = load_at(&path, at(2026, 10, 11));
        assert!(!same_week.rolled_over);
        assert_eq!(same_week.state.ledger.category_counts.total(), 2);
        assert_eq!(same_week.state.ledger.saveable_count, 1);

        let next_week = load_at(&path, at(2026, 10, 14));
        assert!(next_week.rolled_over);
        assert!(!next_week.recovered);
        assert_eq!(next_week.state.ledger.category_counts, CategoryCounts::default());
        assert_eq!(next_week.state.ledger.saveable_count, 0);
        assert_eq!(
            next_week.state.ledger.week_start,
            NaiveDate::from_ymd_opt(2026, 10, 12).unwrap()
        );
        assert_eq!(next_week.state.cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn interrupted_save_leaves_previous_file_intact() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = state_path(temp_dir.path());
        let now = at(2026, 10, 14);
        let state = PipelineState::new(Some("abc".to_string()), now);
        save_at(&path, &state, now).unwrap();
        let before = fs::read(&path).unwrap();

        let mut changed = state.clone();
        changed.mark_processed("def", now);
        let text = render(&changed, now.date_naive()).unwrap();
        let staged = crate::utils::StagedFile::stage(&path, text.as_bytes()).unwrap();
        drop(staged);

        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn reset_keeps_only_cursor() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = state_path(temp_dir.path());
        let mut state = PipelineState::new(Some("old".to_string()), Utc::now());
        state.queue_counter = 12;
        save(&path, &state).unwrap();

        let fresh = reset(&path, Some("head".to_string())).unwrap();
        assert_eq!(fresh.queue_counter, 0);
        let loaded = load(&path);
        assert_eq!(loaded.state.cursor.as_deref(), Some("head"));
        assert_eq!(loaded.state.queue_counter, 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn repeated_saves_stay_bounded(ids in proptest::collection::vec("[0-9a-f]{4}", 1..160)) {
            let temp_dir = tempfile::tempdir().unwrap();
            let path = state_path(temp_dir.path());
            let now = at(2026, 10, 14);
            let mut state = PipelineState::new(None, now);
            for (n, id) in ids.iter().enumerate() {
                state.mark_processed(id, now);
                state.ledger.push_recent(summary(n as u64));
                save_at(&path, &state, now).unwrap();
                state = load_at(&path, now).state;
            }
            prop_assert!(state.dedup_window.len() <= MAX_PROCESSED_COMMITS);
            prop_assert!(state.ledger.recent_drafts.len() <= MAX_RECENT_DRAFTS);
        }
    }
}
