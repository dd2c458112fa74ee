//! Weekly content-mix bookkeeping.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::week_start;

/// Maximum number of draft summaries kept in the ledger.
pub const MAX_RECENT_DRAFTS: usize = 30;

/// The four content categories tracked per week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    /// Demonstrates expertise.
    Authority,
    /// Explains something technical for a broader audience. Counted as saveable.
    Translation,
    /// Personal story or reflection.
    Personal,
    /// Audience growth content.
    Growth,
}

impl ContentCategory {
    /// All categories in canonical order.
    pub const ALL: [Self; 4] = [
        Self::Authority,
        Self::Translation,
        Self::Personal,
        Self::Growth,
    ];

    /// Returns the lowercase key used in files and templates.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authority => "authority",
            Self::Translation => "translation",
            Self::Personal => "personal",
            Self::Growth => "growth",
        }
    }

    /// Parses a template type into a tracked category, if it is one.
    pub fn from_template_type(template_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == template_type)
    }

    /// Whether drafts of this category count toward the weekly saveable target.
    pub fn is_saveable(self) -> bool {
        matches!(self, Self::Translation)
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-category draft counts for the current week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    /// Authority drafts.
    pub authority: u64,
    /// Translation drafts.
    pub translation: u64,
    /// Personal drafts.
    pub personal: u64,
    /// Growth drafts.
    pub growth: u64,
}

impl CategoryCounts {
    /// Returns the count for `category`.
    pub fn get(&self, category: ContentCategory) -> u64 {
        match category {
            ContentCategory::Authority => self.authority,
            ContentCategory::Translation => self.translation,
            ContentCategory::Personal => self.personal,
            ContentCategory::Growth => self.growth,
        }
    }

    /// Mutable access to the count for `category`.
    pub fn get_mut(&mut self, category: ContentCategory) -> &mut u64 {
        match category {
            ContentCategory::Authority => &mut self.authority,
            ContentCategory::Translation => &mut self.translation,
            ContentCategory::Personal => &mut self.personal,
            ContentCategory::Growth => &mut self.growth,
        }
    }

    /// Sum over all categories.
    pub fn total(&self) -> u64 {
        ContentCategory::ALL.into_iter().map(|c| self.get(c)).sum()
    }
}

/// Summary of a queued draft, kept for recent-history context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSummary {
    /// Queue counter value assigned to the draft.
    pub queue_number: u64,
    /// Commit the draft was generated from.
    pub commit_sha: String,
    /// Template the draft used.
    pub template_type: String,
    /// Audience category chosen by the generator.
    pub content_category: String,
    /// RFC3339 generation time.
    pub generated_at: String,
    /// Whether the draft is a thread.
    pub is_thread: bool,
}

/// Weekly ledger of generated content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLedger {
    /// Newest-last summaries, at most [`MAX_RECENT_DRAFTS`].
    pub recent_drafts: Vec<DraftSummary>,
    /// Drafts per category since `week_start`.
    pub category_counts: CategoryCounts,
    /// Saveable drafts since `week_start`.
    pub saveable_count: u64,
    /// Monday anchoring the current counting window.
    pub week_start: NaiveDate,
}

impl ContentLedger {
    /// Creates an empty ledger for the week containing `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            recent_drafts: Vec::new(),
            category_counts: CategoryCounts::default(),
            saveable_count: 0,
            week_start: week_start(today),
        }
    }

    /// Appends a summary, dropping the oldest beyond the bound.
    pub fn push_recent(&mut self, summary: DraftSummary) {
        self.recent_drafts.push(summary);
        self.truncate_recent();
    }

    /// Counts one queued draft of `template_type`.
    ///
    /// Template types outside the tracked categories are not counted.
    pub fn record_template(&mut self, template_type: &str) {
        if let Some(category) = ContentCategory::from_template_type(template_type) {
            *self.category_counts.get_mut(category) += 1;
            if category.is_saveable() {
                self.saveable_count += 1;
            }
        }
    }

    /// Resets the weekly counters when `today` falls in a different week.
    ///
    /// Returns true when a rollover happened.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        let current = week_start(today);
        if self.week_start == current {
            return false;
        }
        self.category_counts = CategoryCounts::default();
        self.saveable_count = 0;
        self.week_start = current;
        true
    }

    pub(crate) fn truncate_recent(&mut self) {
        let excess = self.recent_drafts.len().saturating_sub(MAX_RECENT_DRAFTS);
        if excess > 0 {
            self.recent_drafts.drain(..excess);
        }
    }
}
