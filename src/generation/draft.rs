//! Draft vocabulary and validation of model output.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Most target signals kept per draft.
pub const MAX_TARGET_SIGNALS: usize = 4;
/// Fewest known target signals a draft needs to be accepted.
pub const MIN_TARGET_SIGNALS: usize = 2;

macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[doc = $text] #[serde(rename = $text)] $variant),+
        }

        impl $name {
            /// Every accepted value.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Wire spelling.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Parses the wire spelling; anything else is rejected.
            pub fn parse(text: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.as_str() == text)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// Audience segment a draft is written for.
    Audience {
        AiCuriousBuilder => "AI-Curious Builder",
        AutonomySeekingProfessional => "Autonomy-Seeking Professional",
        SystemsMindedSelfImprover => "Systems-Minded Self-Improver",
        CrossGroup => "cross-group",
    }
}

vocabulary! {
    /// Posting slot.
    SuggestedTime {
        WeekdayMorning => "weekday_morning",
        WeekdayAfternoon => "weekday_afternoon",
        WeekdayEvening => "weekday_evening",
        WeekendAfternoon => "weekend_afternoon",
    }
}

vocabulary! {
    /// Engagement signal a draft is optimized for.
    Signal {
        Like => "like",
        Reply => "reply",
        Repost => "repost",
        QuoteTweet => "quote_tweet",
        DwellTime => "dwell_time",
        ProfileClick => "profile_click",
        CopyLink => "copy_link",
        DmShare => "dm_share",
    }
}

/// One accepted draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// Template the model picked, e.g. `authority`.
    pub template_type: String,
    /// Target audience.
    pub content_category: Audience,
    /// When to post.
    pub suggested_time: SuggestedTime,
    /// Between two and four known signals.
    pub target_signals: Vec<Signal>,
    /// Whether `content` is a multi-tweet thread.
    pub is_thread: bool,
    /// Post text; thread tweets are separated by `---` lines.
    pub content: String,
}

fn trimmed_str<'a>(item: &'a serde_json::Map<String, Value>, key: &str) -> &'a str {
    item.get(key).and_then(Value::as_str).map_or("", str::trim)
}

impl Draft {
    /// Accepts one entry of the `drafts` array, or `None` if any field is
    /// missing or outside the vocabulary.
    pub fn from_value(value: &Value) -> Option<Self> {
        let item = value.as_object()?;

        let template_type = trimmed_str(item, "template_type");
        let content = trimmed_str(item, "content");
        if template_type.is_empty() || content.is_empty() {
            return None;
        }

        let content_category = Audience::parse(trimmed_str(item, "content_category"))?;
        let suggested_time = SuggestedTime::parse(trimmed_str(item, "suggested_time"))?;

        let signals: Vec<Signal> = item
            .get("target_signals")?
            .as_array()?
            .iter()
            .filter_map(|s| s.as_str().and_then(Signal::parse))
            .collect();
        if signals.len() < MIN_TARGET_SIGNALS {
            return None;
        }

        Some(Self {
            template_type: template_type.to_string(),
            content_category,
            suggested_time,
            target_signals: signals.into_iter().take(MAX_TARGET_SIGNALS).collect(),
            is_thread: item.get("is_thread").and_then(Value::as_bool).unwrap_or(false),
            content: content.to_string(),
        })
    }

    /// Thread parts, split on `---` separator lines.
    pub fn thread_parts(&self) -> Vec<&str> {
        self.content
            .split("\n---\n")
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect()
    }
}
