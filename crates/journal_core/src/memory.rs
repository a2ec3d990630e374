//! crates/journal_core/src/memory.rs
//!
//! In-memory implementations of the store ports, for tests and local runs.
//! They keep the same row-level contracts as the Postgres adapter: guarded
//! streak updates and one summary per `(user_id, week_start)`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{JournalEntry, NewWeeklySummary, UserProgress, WeekActivity, WeeklySummary};
use crate::ports::{JournalStore, PortError, PortResult, ProgressStore, SummaryStore};

//=========================================================================================
// Progress Store
//=========================================================================================

#[derive(Default)]
pub struct InMemoryProgressStore {
    records: Mutex<HashMap<String, UserProgress>>,
    writes: AtomicUsize,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls served so far, record creation included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Runs `change` on an existing record and returns the updated copy.
    async fn mutate<F>(&self, user_id: &str, change: F) -> PortResult<UserProgress>
    where
        F: FnOnce(&mut UserProgress) -> PortResult<()>,
    {
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(user_id)
            .ok_or_else(|| PortError::NotFound(format!("progress for user {}", user_id)))?;
        change(record)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(record.clone())
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn get_or_create(&self, user_id: &str) -> PortResult<UserProgress> {
        let mut records = self.records.lock().await;
        let record = records.entry(user_id.to_string()).or_insert_with(|| {
            self.writes.fetch_add(1, Ordering::SeqCst);
            UserProgress::new(user_id)
        });
        Ok(record.clone())
    }

    async fn get(&self, user_id: &str) -> PortResult<UserProgress> {
        self.records
            .lock()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("progress for user {}", user_id)))
    }

    async fn add_golden_ink(&self, user_id: &str, delta: i32) -> PortResult<UserProgress> {
        self.mutate(user_id, |p| {
            p.golden_ink = p.golden_ink.saturating_add(delta);
            Ok(())
        })
        .await
    }

    async fn add_marble(&self, user_id: &str, delta: i32) -> PortResult<UserProgress> {
        self.mutate(user_id, |p| {
            p.marble = p.marble.saturating_add(delta);
            Ok(())
        })
        .await
    }

    async fn update_streak(
        &self,
        user_id: &str,
        new_streak: i32,
        active_date: NaiveDate,
        expected_last_active: Option<NaiveDate>,
    ) -> PortResult<UserProgress> {
        self.mutate(user_id, |p| {
            if p.last_active_date != expected_last_active {
                return Err(PortError::Conflict(format!(
                    "last active date is {:?}, expected {:?}",
                    p.last_active_date, expected_last_active
                )));
            }
            p.current_streak = new_streak;
            p.longest_streak = p.longest_streak.max(new_streak);
            p.last_active_date = Some(active_date);
            Ok(())
        })
        .await
    }

    async fn add_xp(&self, user_id: &str, delta: i32) -> PortResult<UserProgress> {
        self.mutate(user_id, |p| {
            p.current_xp = p.current_xp.saturating_add(delta);
            p.total_xp = p.total_xp.saturating_add(delta);
            Ok(())
        })
        .await
    }

    async fn set_level(&self, user_id: &str, level: i32, base_xp_per_level: i32)
        -> PortResult<UserProgress> {
        self.mutate(user_id, |p| {
            p.level = p.level.max(level);
            let floor = (p.level - 1).max(0).saturating_mul(base_xp_per_level.max(0));
            p.current_xp = p.total_xp - floor;
            Ok(())
        })
        .await
    }
}

//=========================================================================================
// Summary Store
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

struct SessionRow {
    id: Uuid,
    user_id: String,
    day: NaiveDate,
    started_at: DateTime<Utc>,
    golden_ink_earned: i32,
}

struct MessageRow {
    session_id: Uuid,
    role: MessageRole,
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Journal {
    summaries: Vec<WeeklySummary>,
    sessions: Vec<SessionRow>,
    messages: Vec<MessageRow>,
}

impl Journal {
    /// Sessions of `user_id` started inside the window.
    fn sessions_in(
        &self,
        user_id: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Vec<Uuid> {
        let (start, end) = (start.with_timezone(&Utc), end.with_timezone(&Utc));
        self.sessions
            .iter()
            .filter(|s| s.user_id == user_id && s.started_at >= start && s.started_at <= end)
            .map(|s| s.id)
            .collect()
    }

    fn push_message(
        &mut self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Uuid {
        self.messages.push(MessageRow {
            session_id,
            role,
            content: content.to_string(),
            created_at,
        });
        Uuid::new_v4()
    }

    fn user_messages_in<'a>(&'a self, sessions: &'a [Uuid]) -> impl Iterator<Item = &'a MessageRow> {
        self.messages
            .iter()
            .filter(move |m| m.role == MessageRole::User && sessions.contains(&m.session_id))
    }
}

/// Journal sessions, messages and weekly summaries held in memory.
#[derive(Default)]
pub struct InMemorySummaryStore {
    journal: Mutex<Journal>,
}

impl InMemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_session(&self, user_id: &str, started_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.journal.lock().await.sessions.push(SessionRow {
            id,
            user_id: user_id.to_string(),
            day: started_at.date_naive(),
            started_at,
            golden_ink_earned: 0,
        });
        id
    }

    pub async fn record_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
        created_at: DateTime<Utc>,
    ) {
        let mut journal = self.journal.lock().await;
        journal.push_message(session_id, role, content, created_at);
    }

    /// Golden ink credited to a session, if it exists.
    pub async fn session_golden_ink(&self, session_id: Uuid) -> Option<i32> {
        self.journal
            .lock()
            .await
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .map(|s| s.golden_ink_earned)
    }

    /// Number of sessions opened by `user_id`.
    pub async fn session_count(&self, user_id: &str) -> usize {
        self.journal
            .lock()
            .await
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl SummaryStore for InMemorySummaryStore {
    async fn find(&self, user_id: &str, week_start: NaiveDate)
        -> PortResult<Option<WeeklySummary>> {
        Ok(self
            .journal
            .lock()
            .await
            .summaries
            .iter()
            .find(|s| s.user_id == user_id && s.week_start == week_start)
            .cloned())
    }

    async fn create(&self, summary: NewWeeklySummary) -> PortResult<WeeklySummary> {
        let mut journal = self.journal.lock().await;
        if journal
            .summaries
            .iter()
            .any(|s| s.user_id == summary.user_id && s.week_start == summary.week_start)
        {
            return Err(PortError::Conflict(format!(
                "summary for {} week {} already exists",
                summary.user_id, summary.week_start
            )));
        }
        let stored = WeeklySummary {
            id: Uuid::new_v4(),
            user_id: summary.user_id,
            week_start: summary.week_start,
            week_end: summary.week_end,
            summary_text: summary.summary_text,
            session_count: summary.session_count,
            message_count: summary.message_count,
            emotions: summary.emotions,
            created_at: Utc::now(),
        };
        journal.summaries.push(stored.clone());
        Ok(stored)
    }

    async fn list(&self, user_id: &str, limit: i64, offset: i64)
        -> PortResult<Vec<WeeklySummary>> {
        let journal = self.journal.lock().await;
        let mut rows: Vec<WeeklySummary> = journal
            .summaries
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.week_start.cmp(&a.week_start));
        Ok(rows
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn latest(&self, user_id: &str) -> PortResult<Option<WeeklySummary>> {
        Ok(self.list(user_id, 1, 0).await?.into_iter().next())
    }

    async fn aggregate_counts(
        &self,
        user_id: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> PortResult<WeekActivity> {
        let journal = self.journal.lock().await;
        let sessions = journal.sessions_in(user_id, start, end);
        let message_count = journal.user_messages_in(&sessions).count();
        Ok(WeekActivity {
            session_count: i32::try_from(sessions.len()).unwrap_or(i32::MAX),
            message_count: i32::try_from(message_count).unwrap_or(i32::MAX),
        })
    }

    async fn fetch_message_texts(
        &self,
        user_id: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> PortResult<Vec<String>> {
        let journal = self.journal.lock().await;
        let sessions = journal.sessions_in(user_id, start, end);
        let mut messages: Vec<&MessageRow> = journal.user_messages_in(&sessions).collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages.into_iter().map(|m| m.content.clone()).collect())
    }
}

#[async_trait]
impl JournalStore for InMemorySummaryStore {
    async fn record_user_message(
        &self,
        user_id: &str,
        day: NaiveDate,
        content: &str,
        at: DateTime<Utc>,
    ) -> PortResult<JournalEntry> {
        let mut journal = self.journal.lock().await;
        let existing = journal
            .sessions
            .iter()
            .find(|s| s.user_id == user_id && s.day == day)
            .map(|s| s.id);
        let session_id = match existing {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                journal.sessions.push(SessionRow {
                    id,
                    user_id: user_id.to_string(),
                    day,
                    started_at: at,
                    golden_ink_earned: 0,
                });
                id
            }
        };
        let message_id = journal.push_message(session_id, MessageRole::User, content, at);
        Ok(JournalEntry {
            session_id,
            message_id,
        })
    }

    async fn add_session_golden_ink(&self, session_id: Uuid, delta: i32) -> PortResult<()> {
        let mut journal = self.journal.lock().await;
        let session = journal
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| PortError::NotFound(format!("session {}", session_id)))?;
        session.golden_ink_earned = session.golden_ink_earned.saturating_add(delta);
        Ok(())
    }
}
