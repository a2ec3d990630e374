//! crates/journal_core/src/journal.rs
//!
//! Saving a journal message and rewarding it. The message lands in the
//! user's session for the day before anything is granted, so every reward
//! corresponds to text the weekly summaries can later read.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::domain::SubmittedMessage;
use crate::ports::{JournalStore, PortResult};
use crate::progression::ProgressionService;

#[derive(Clone)]
pub struct JournalService {
    journal: Arc<dyn JournalStore>,
    progression: ProgressionService,
}

impl JournalService {
    pub fn new(journal: Arc<dyn JournalStore>, progression: ProgressionService) -> Self {
        Self {
            journal,
            progression,
        }
    }

    pub fn progression(&self) -> &ProgressionService {
        &self.progression
    }

    /// Saves `text` as a user message at `now` and grants what it earns.
    ///
    /// A failed save is returned and nothing is granted. Once saved, reward
    /// failures are logged and surface as zeroed fields, and the session's
    /// golden-ink tally is best effort.
    pub async fn submit_message(
        &self,
        user_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> PortResult<SubmittedMessage> {
        // Same UTC calendar day the streak uses.
        let today = now.date_naive();
        let entry = self
            .journal
            .record_user_message(user_id, today, text, now)
            .await?;
        debug!(user_id, session_id = %entry.session_id, "Saved journal message");

        let rewards = self.progression.reward_message_on(user_id, text, today).await;

        if rewards.golden_ink > 0 {
            if let Err(e) = self
                .journal
                .add_session_golden_ink(entry.session_id, rewards.golden_ink)
                .await
            {
                error!(
                    user_id,
                    session_id = %entry.session_id,
                    error = %e,
                    "Failed to add golden ink to session"
                );
            }
        }

        Ok(SubmittedMessage { entry, rewards })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JournalEntry;
    use crate::leveling::LevelingConfig;
    use crate::memory::{InMemoryProgressStore, InMemorySummaryStore};
    use crate::ports::{PortError, ProgressStore, SummaryStore};
    use crate::rewards::RewardConfig;
    use async_trait::async_trait;
    use chrono::{FixedOffset, NaiveDate, TimeZone};
    use uuid::Uuid;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    fn utc_window(day: u32) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
        let zone = FixedOffset::east_opt(0).unwrap();
        (
            at(day, 0).with_timezone(&zone),
            at(day + 1, 0).with_timezone(&zone),
        )
    }

    fn progression(store: Arc<InMemoryProgressStore>) -> ProgressionService {
        ProgressionService::new(store, RewardConfig::default(), LevelingConfig::default())
    }

    #[tokio::test]
    async fn test_messages_share_the_days_session() {
        let progress = Arc::new(InMemoryProgressStore::new());
        let journal = Arc::new(InMemorySummaryStore::new());
        let service = JournalService::new(journal.clone(), progression(progress.clone()));

        let first = service
            .submit_message("user_a", "a short entry", at(5, 8))
            .await
            .unwrap();
        let second = service
            .submit_message("user_a", &"kata ".repeat(25), at(5, 21))
            .await
            .unwrap();

        assert_eq!(first.entry.session_id, second.entry.session_id);
        assert_ne!(first.entry.message_id, second.entry.message_id);
        assert_eq!(first.rewards.golden_ink, 1);
        assert_eq!(second.rewards.golden_ink, 3);
        assert_eq!(first.rewards.marble, 1);
        assert_eq!(second.rewards.marble, 0);
        assert_eq!(journal.session_count("user_a").await, 1);
        assert_eq!(journal.session_golden_ink(first.entry.session_id).await, Some(4));

        let (start, end) = utc_window(5);
        let activity = journal.aggregate_counts("user_a", start, end).await.unwrap();
        assert_eq!(activity.session_count, 1);
        assert_eq!(activity.message_count, 2);
        let texts = journal.fetch_message_texts("user_a", start, end).await.unwrap();
        assert_eq!(texts[0], "a short entry");

        let stored = progress.get("user_a").await.unwrap();
        assert_eq!(stored.golden_ink, 4);
        assert_eq!(stored.total_xp, 4);
    }

    #[tokio::test]
    async fn test_next_day_opens_a_new_session() {
        let progress = Arc::new(InMemoryProgressStore::new());
        let journal = Arc::new(InMemorySummaryStore::new());
        let service = JournalService::new(journal.clone(), progression(progress));

        let monday = service.submit_message("user_a", "one", at(3, 23)).await.unwrap();
        let tuesday = service.submit_message("user_a", "two", at(4, 1)).await.unwrap();

        assert_ne!(monday.entry.session_id, tuesday.entry.session_id);
        assert_eq!(tuesday.rewards.new_streak, 2);
        assert_eq!(journal.session_count("user_a").await, 2);
    }

    /// Fails the message save or the session tally on demand.
    struct BrokenJournal {
        inner: InMemorySummaryStore,
        fail_save: bool,
    }

    #[async_trait]
    impl JournalStore for BrokenJournal {
        async fn record_user_message(
            &self,
            user_id: &str,
            day: NaiveDate,
            content: &str,
            at: DateTime<Utc>,
        ) -> PortResult<JournalEntry> {
            if self.fail_save {
                return Err(PortError::Store("disk full".to_string()));
            }
            self.inner.record_user_message(user_id, day, content, at).await
        }

        async fn add_session_golden_ink(&self, _session_id: Uuid, _delta: i32) -> PortResult<()> {
            Err(PortError::Store("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_save_grants_nothing() {
        let progress = Arc::new(InMemoryProgressStore::new());
        let journal = Arc::new(BrokenJournal {
            inner: InMemorySummaryStore::new(),
            fail_save: true,
        });
        let service = JournalService::new(journal, progression(progress.clone()));

        let result = service.submit_message("user_a", "lost words", at(5, 8)).await;

        assert!(matches!(result, Err(PortError::Store(_))));
        assert!(matches!(progress.get("user_a").await, Err(PortError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_session_tally_failure_keeps_rewards() {
        let progress = Arc::new(InMemoryProgressStore::new());
        let journal = Arc::new(BrokenJournal {
            inner: InMemorySummaryStore::new(),
            fail_save: false,
        });
        let service = JournalService::new(journal, progression(progress.clone()));

        let submitted = service
            .submit_message("user_a", "still counted", at(5, 8))
            .await
            .unwrap();

        assert_eq!(submitted.rewards.golden_ink, 1);
        assert_eq!(progress.get("user_a").await.unwrap().golden_ink, 1);
    }
}
