//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! `ProgressStore`, `SummaryStore` and `JournalStore` ports from the `journal_core`
//! crate. It handles all interactions with the PostgreSQL database using `sqlx`.
//!
//! Every progress mutation is a single statement so that concurrent reward events
//! for the same user serialize on the row instead of on a lock in this process.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use journal_core::domain::{
    JournalEntry, NewWeeklySummary, UserProgress, WeekActivity, WeeklyEmotions, WeeklySummary,
};
use journal_core::ports::{JournalStore, PortError, PortResult, ProgressStore, SummaryStore};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

const PROGRESS_COLUMNS: &str = "user_id, golden_ink, marble, current_streak, longest_streak, \
     level, current_xp, total_xp, last_active_date";

const SUMMARY_COLUMNS: &str = "id, user_id, week_start, week_end, summary, session_count, \
     message_count, emotions, created_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the store ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Runs a single-statement update on an existing progress row.
    async fn update_progress(
        &self,
        user_id: &str,
        assignments: &str,
        delta: i32,
    ) -> PortResult<UserProgress> {
        let sql = format!(
            "UPDATE user_progress SET {}, updated_at = NOW() WHERE user_id = $1 RETURNING {}",
            assignments, PROGRESS_COLUMNS
        );
        let record = sqlx::query_as::<_, ProgressRecord>(&sql)
            .bind(user_id)
            .bind(delta)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        record
            .map(ProgressRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("progress for user {}", user_id)))
    }
}

/// Maps a driver error onto the port vocabulary.
fn store_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            PortError::Conflict(db.message().to_string())
        }
        _ => PortError::Store(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProgressRecord {
    user_id: String,
    golden_ink: i32,
    marble: i32,
    current_streak: i32,
    longest_streak: i32,
    level: i32,
    current_xp: i32,
    total_xp: i32,
    last_active_date: Option<NaiveDate>,
}
impl ProgressRecord {
    fn to_domain(self) -> UserProgress {
        UserProgress {
            user_id: self.user_id,
            golden_ink: self.golden_ink,
            marble: self.marble,
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            level: self.level,
            current_xp: self.current_xp,
            total_xp: self.total_xp,
            last_active_date: self.last_active_date,
        }
    }
}

#[derive(FromRow)]
struct SummaryRecord {
    id: Uuid,
    user_id: String,
    week_start: NaiveDate,
    week_end: NaiveDate,
    summary: String,
    session_count: i32,
    message_count: i32,
    emotions: Json<WeeklyEmotions>,
    created_at: DateTime<Utc>,
}
impl SummaryRecord {
    fn to_domain(self) -> WeeklySummary {
        WeeklySummary {
            id: self.id,
            user_id: self.user_id,
            week_start: self.week_start,
            week_end: self.week_end,
            summary_text: self.summary,
            session_count: self.session_count,
            message_count: self.message_count,
            emotions: self.emotions.0,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ActivityRecord {
    session_count: i32,
    message_count: i32,
}

//=========================================================================================
// `ProgressStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProgressStore for DbAdapter {
    async fn get_or_create(&self, user_id: &str) -> PortResult<UserProgress> {
        sqlx::query("INSERT INTO user_progress (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        self.get(user_id).await
    }

    async fn get(&self, user_id: &str) -> PortResult<UserProgress> {
        let sql = format!("SELECT {} FROM user_progress WHERE user_id = $1", PROGRESS_COLUMNS);
        let record = sqlx::query_as::<_, ProgressRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("progress for user {}", user_id))
                }
                _ => store_error(e),
            })?;
        Ok(record.to_domain())
    }

    async fn add_golden_ink(&self, user_id: &str, delta: i32) -> PortResult<UserProgress> {
        self.update_progress(user_id, "golden_ink = golden_ink + $2", delta)
            .await
    }

    async fn add_marble(&self, user_id: &str, delta: i32) -> PortResult<UserProgress> {
        self.update_progress(user_id, "marble = marble + $2", delta).await
    }

    async fn update_streak(
        &self,
        user_id: &str,
        new_streak: i32,
        active_date: NaiveDate,
        expected_last_active: Option<NaiveDate>,
    ) -> PortResult<UserProgress> {
        let sql = format!(
            "UPDATE user_progress \
             SET current_streak = $2, longest_streak = GREATEST(longest_streak, $2), \
                 last_active_date = $3, updated_at = NOW() \
             WHERE user_id = $1 AND last_active_date IS NOT DISTINCT FROM $4 \
             RETURNING {}",
            PROGRESS_COLUMNS
        );
        let record = sqlx::query_as::<_, ProgressRecord>(&sql)
            .bind(user_id)
            .bind(new_streak)
            .bind(active_date)
            .bind(expected_last_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        match record {
            Some(record) => Ok(record.to_domain()),
            None => {
                // Either the row is gone or another request moved the date first.
                let current = self.get(user_id).await?;
                Err(PortError::Conflict(format!(
                    "last active date is {:?}, expected {:?}",
                    current.last_active_date, expected_last_active
                )))
            }
        }
    }

    async fn add_xp(&self, user_id: &str, delta: i32) -> PortResult<UserProgress> {
        self.update_progress(
            user_id,
            "current_xp = current_xp + $2, total_xp = total_xp + $2",
            delta,
        )
        .await
    }

    async fn set_level(&self, user_id: &str, level: i32, base_xp_per_level: i32)
        -> PortResult<UserProgress> {
        // Level only moves up; current_xp follows from the row's own total_xp.
        let sql = format!(
            "UPDATE user_progress SET level = GREATEST(level, $2), \
             current_xp = total_xp - (GREATEST(level, $2) - 1) * GREATEST($3, 0), \
             updated_at = NOW() WHERE user_id = $1 RETURNING {}",
            PROGRESS_COLUMNS
        );
        let record = sqlx::query_as::<_, ProgressRecord>(&sql)
            .bind(user_id)
            .bind(level)
            .bind(base_xp_per_level)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        record
            .map(ProgressRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("progress for user {}", user_id)))
    }
}

//=========================================================================================
// `SummaryStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SummaryStore for DbAdapter {
    async fn find(&self, user_id: &str, week_start: NaiveDate)
        -> PortResult<Option<WeeklySummary>> {
        let sql = format!(
            "SELECT {} FROM weekly_summaries WHERE user_id = $1 AND week_start = $2",
            SUMMARY_COLUMNS
        );
        let record = sqlx::query_as::<_, SummaryRecord>(&sql)
            .bind(user_id)
            .bind(week_start)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(record.map(SummaryRecord::to_domain))
    }

    async fn create(&self, summary: NewWeeklySummary) -> PortResult<WeeklySummary> {
        let sql = format!(
            "INSERT INTO weekly_summaries \
             (id, user_id, week_start, week_end, summary, session_count, message_count, emotions) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            SUMMARY_COLUMNS
        );
        let record = sqlx::query_as::<_, SummaryRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&summary.user_id)
            .bind(summary.week_start)
            .bind(summary.week_end)
            .bind(&summary.summary_text)
            .bind(summary.session_count)
            .bind(summary.message_count)
            .bind(Json(&summary.emotions))
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(record.to_domain())
    }

    async fn list(&self, user_id: &str, limit: i64, offset: i64)
        -> PortResult<Vec<WeeklySummary>> {
        let sql = format!(
            "SELECT {} FROM weekly_summaries WHERE user_id = $1 \
             ORDER BY week_start DESC LIMIT $2 OFFSET $3",
            SUMMARY_COLUMNS
        );
        let records = sqlx::query_as::<_, SummaryRecord>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(records.into_iter().map(SummaryRecord::to_domain).collect())
    }

    async fn latest(&self, user_id: &str) -> PortResult<Option<WeeklySummary>> {
        let sql = format!(
            "SELECT {} FROM weekly_summaries WHERE user_id = $1 ORDER BY week_start DESC LIMIT 1",
            SUMMARY_COLUMNS
        );
        let record = sqlx::query_as::<_, SummaryRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(record.map(SummaryRecord::to_domain))
    }

    async fn aggregate_counts(
        &self,
        user_id: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> PortResult<WeekActivity> {
        let record = sqlx::query_as::<_, ActivityRecord>(
            "SELECT COUNT(DISTINCT s.id)::INT4 AS session_count, \
                    COUNT(m.id)::INT4 AS message_count \
             FROM journal_sessions s \
             LEFT JOIN journal_messages m ON m.session_id = s.id AND m.role = 'user' \
             WHERE s.user_id = $1 AND s.started_at BETWEEN $2 AND $3",
        )
        .bind(user_id)
        .bind(start.with_timezone(&Utc))
        .bind(end.with_timezone(&Utc))
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(WeekActivity {
            session_count: record.session_count,
            message_count: record.message_count,
        })
    }

    async fn fetch_message_texts(
        &self,
        user_id: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> PortResult<Vec<String>> {
        let texts = sqlx::query_scalar::<_, String>(
            "SELECT m.content FROM journal_messages m \
             JOIN journal_sessions s ON s.id = m.session_id \
             WHERE s.user_id = $1 AND m.role = 'user' AND s.started_at BETWEEN $2 AND $3 \
             ORDER BY m.created_at ASC",
        )
        .bind(user_id)
        .bind(start.with_timezone(&Utc))
        .bind(end.with_timezone(&Utc))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(texts)
    }
}

//=========================================================================================
// `JournalStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl JournalStore for DbAdapter {
    /// Upserts the day's session and inserts the message in one transaction.
    async fn record_user_message(
        &self,
        user_id: &str,
        day: NaiveDate,
        content: &str,
        at: DateTime<Utc>,
    ) -> PortResult<JournalEntry> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        // The no-op update makes RETURNING yield the existing row's id too.
        let session_id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO journal_sessions (id, user_id, session_day, started_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, session_day) DO UPDATE SET user_id = EXCLUDED.user_id \
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(day)
        .bind(at)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_error)?;

        let message_id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO journal_messages (id, session_id, role, content, created_at) \
             VALUES ($1, $2, 'user', $3, $4) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(content)
        .bind(at)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_error)?;

        tx.commit().await.map_err(store_error)?;
        Ok(JournalEntry {
            session_id,
            message_id,
        })
    }

    async fn add_session_golden_ink(&self, session_id: Uuid, delta: i32) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE journal_sessions SET golden_ink_earned = golden_ink_earned + $2 WHERE id = $1",
        )
        .bind(session_id)
        .bind(delta)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("session {}", session_id)));
        }
        Ok(())
    }
}
