//! crates/journal_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the engine's collaborators.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! reward and summary logic independent of Postgres or any AI provider.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{JournalEntry, NewWeeklySummary, UserProgress, WeekActivity, WeeklySummary};
use crate::schema::SummarySchema;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A write lost against a concurrent writer (unique key or guarded update).
    #[error("Conflicting write: {0}")]
    Conflict(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Text generation failed: {0}")]
    Generation(String),
    #[error("Invalid input: {0}")]
    Validation(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Row-atomic access to the per-user progression record.
///
/// Each call is independently atomic; callers compose several per reward
/// event without a surrounding transaction.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn get_or_create(&self, user_id: &str) -> PortResult<UserProgress>;

    /// Reads without creating. Returns `NotFound` for an unknown user.
    async fn get(&self, user_id: &str) -> PortResult<UserProgress>;

    async fn add_golden_ink(&self, user_id: &str, delta: i32) -> PortResult<UserProgress>;

    async fn add_marble(&self, user_id: &str, delta: i32) -> PortResult<UserProgress>;

    /// Sets the streak and last active date only if the stored
    /// `last_active_date` still equals `expected_last_active`, raising
    /// `longest_streak` when surpassed. A mismatch yields `Conflict`.
    async fn update_streak(
        &self,
        user_id: &str,
        new_streak: i32,
        active_date: NaiveDate,
        expected_last_active: Option<NaiveDate>,
    ) -> PortResult<UserProgress>;

    /// Adds to both `current_xp` and `total_xp`.
    async fn add_xp(&self, user_id: &str, delta: i32) -> PortResult<UserProgress>;

    /// Raises the stored level to at least `level` and rederives
    /// `current_xp` from the stored `total_xp` in the same write:
    /// `total_xp - (level - 1) * base_xp_per_level` for the resulting level.
    /// A lower `level` than the stored one never lowers it.
    async fn set_level(&self, user_id: &str, level: i32, base_xp_per_level: i32)
        -> PortResult<UserProgress>;
}

#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn find(&self, user_id: &str, week_start: NaiveDate)
        -> PortResult<Option<WeeklySummary>>;

    /// Persists a new summary. A second summary for the same
    /// `(user_id, week_start)` yields `Conflict`.
    async fn create(&self, summary: NewWeeklySummary) -> PortResult<WeeklySummary>;

    /// Newest week first.
    async fn list(&self, user_id: &str, limit: i64, offset: i64)
        -> PortResult<Vec<WeeklySummary>>;

    async fn latest(&self, user_id: &str) -> PortResult<Option<WeeklySummary>>;

    async fn aggregate_counts(
        &self,
        user_id: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> PortResult<WeekActivity>;

    /// User-authored message bodies inside the window, oldest first.
    async fn fetch_message_texts(
        &self,
        user_id: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> PortResult<Vec<String>>;
}

/// Write side of the journal the weekly summaries are built from.
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Saves a user-authored message into the user's session for `day`,
    /// opening that session first. At most one session exists per user and day.
    async fn record_user_message(
        &self,
        user_id: &str,
        day: NaiveDate,
        content: &str,
        at: DateTime<Utc>,
    ) -> PortResult<JournalEntry>;

    /// Adds golden ink to the running total of one session.
    async fn add_session_golden_ink(&self, session_id: Uuid, delta: i32) -> PortResult<()>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Completes `prompt`, returning JSON text that conforms to `schema`.
    async fn complete_structured(&self, prompt: &str, schema: &SummarySchema)
        -> PortResult<String>;
}
