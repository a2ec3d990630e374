//! crates/journal_core/src/domain.rs
//!
//! Defines the pure, core data structures for the progression engine.
//! These structs are independent of any database; serde derives only describe
//! the snake_case JSON shape callers expose.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-user progression record: currencies, streak and XP.
///
/// `current_xp` is the XP earned inside the current level, so it always equals
/// `total_xp - xp_required_for_level(level)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: String,
    pub golden_ink: i32,
    pub marble: i32,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub level: i32,
    pub current_xp: i32,
    pub total_xp: i32,
    /// UTC calendar date of the last streak-advancing activity.
    pub last_active_date: Option<NaiveDate>,
}

impl UserProgress {
    /// A freshly created record, as the store hands it out on first access.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            golden_ink: 0,
            marble: 0,
            current_streak: 0,
            longest_streak: 0,
            level: 1,
            current_xp: 0,
            total_xp: 0,
            last_active_date: None,
        }
    }
}

/// Currency and streak changes produced by a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RewardOutcome {
    pub golden_ink_delta: i32,
    pub marble_delta: i32,
    pub streak_updated: bool,
    pub new_streak: i32,
}

/// XP and level changes produced by a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelOutcome {
    pub xp_earned: i32,
    pub current_xp: i32,
    pub total_xp: i32,
    pub level: i32,
    pub leveled_up: bool,
    pub levels_gained: i32,
    pub xp_to_next_level: i32,
}

/// Combined reward payload for one submitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MessageRewards {
    pub word_count: i32,
    pub golden_ink: i32,
    pub marble: i32,
    pub new_streak: i32,
    pub streak_updated: bool,
    pub xp_earned: i32,
    pub level: i32,
    pub leveled_up: bool,
    pub levels_gained: i32,
    pub xp_to_next_level: i32,
}

/// Where a saved journal message landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    pub session_id: Uuid,
    pub message_id: Uuid,
}

/// A journal message that was saved and then rewarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmittedMessage {
    pub entry: JournalEntry,
    pub rewards: MessageRewards,
}

/// Stats view of a user: the stored record plus derived level progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    #[serde(flatten)]
    pub progress: UserProgress,
    pub xp_to_next_level: i32,
    /// Percentage (0-100) of the way from the current level to the next.
    pub level_progress: i32,
}

/// A Sunday 00:00:00 to Saturday 23:59:59 window anchored in one zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekBoundaries {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl WeekBoundaries {
    /// Local calendar date of the Sunday opening the window.
    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Local calendar date of the Saturday closing the window.
    pub fn end_date(&self) -> NaiveDate {
        self.end.date_naive()
    }

    /// Whether `instant` falls inside the window, both ends inclusive.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let instant = instant.with_timezone(self.start.offset());
        instant >= self.start && instant <= self.end
    }

    /// The window exactly one week earlier.
    pub fn previous(&self) -> Self {
        let week = chrono::Duration::days(7);
        Self {
            start: self.start - week,
            end: self.end - week,
        }
    }
}

/// Aggregate activity counts for a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeekActivity {
    pub session_count: i32,
    pub message_count: i32,
}

/// Direction of the user's mood across a week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Challenging,
}

/// The emotional read of a week, persisted as a single structured blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyEmotions {
    pub dominant_emotion: String,
    pub secondary_emotions: Vec<String>,
    pub trend: Trend,
    pub insights: Vec<String>,
    pub encouragement: String,
}

impl WeeklyEmotions {
    /// The neutral read used when a week holds no writing at all.
    pub fn neutral() -> Self {
        Self {
            dominant_emotion: "neutral".to_string(),
            secondary_emotions: Vec::new(),
            trend: Trend::Stable,
            insights: Vec::new(),
            encouragement: "Whenever you are ready, a few lines are enough to begin again."
                .to_string(),
        }
    }
}

/// One AI-authored summary per user per completed week. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklySummary {
    pub id: Uuid,
    pub user_id: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    #[serde(rename = "summary")]
    pub summary_text: String,
    pub session_count: i32,
    pub message_count: i32,
    pub emotions: WeeklyEmotions,
    pub created_at: DateTime<Utc>,
}

/// A summary ready to be persisted; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWeeklySummary {
    pub user_id: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub summary_text: String,
    pub session_count: i32,
    pub message_count: i32,
    pub emotions: WeeklyEmotions,
}
