//! Bounded record of recently processed commit ids.

use std::collections::VecDeque;

use serde::{Serialize, Serializer};

/// Maximum number of commit ids remembered.
pub const MAX_PROCESSED_COMMITS: usize = 100;

/// FIFO-bounded ordered set of processed commit ids.
///
/// Ids are unique; inserting an id that is already present moves it to the
/// newest position. Once the window is full the oldest id is evicted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupWindow {
    ids: VecDeque<String>,
}

impl DedupWindow {
    /// Creates an empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a window from ids in oldest-first order.
    ///
    /// Later duplicates are dropped and only the newest
    /// [`MAX_PROCESSED_COMMITS`] ids are kept.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut deduped: Vec<String> = Vec::new();
        for id in ids {
            let id = id.into();
            if !deduped.contains(&id) {
                deduped.push(id);
            }
        }
        let skip = deduped.len().saturating_sub(MAX_PROCESSED_COMMITS);
        Self {
            ids: deduped.into_iter().skip(skip).collect(),
        }
    }

    /// Returns whether `id` has been recorded.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|seen| seen == id)
    }

    /// Records `id` as the newest entry, evicting the oldest when full.
    pub fn insert(&mut self, id: &str) {
        self.ids.retain(|seen| seen != id);
        self.ids.push_back(id.to_string());
        while self.ids.len() > MAX_PROCESSED_COMMITS {
            self.ids.pop_front();
        }
    }

    /// Number of ids held.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true when no id has been recorded.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterates ids oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl Serialize for DedupWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.ids.iter())
    }
}
