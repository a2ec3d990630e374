//! crates/journal_core/src/progression.rs
//!
//! The message-submission flow: count words once, then run the currency/streak
//! path and the XP path side by side and fold both into one payload.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::error;

use crate::domain::{MessageRewards, ProgressSnapshot};
use crate::leveling::{LevelingCalculator, LevelingConfig, LevelingService};
use crate::ports::{PortResult, ProgressStore};
use crate::rewards::{RewardCalculator, RewardConfig, RewardService};
use crate::words::count_words;

/// Word count of `text`, saturated into the engine's integer width.
pub fn word_count_of(text: &str) -> i32 {
    i32::try_from(count_words(text)).unwrap_or(i32::MAX)
}

#[derive(Clone)]
pub struct ProgressionService {
    store: Arc<dyn ProgressStore>,
    rewards: RewardService,
    leveling: LevelingService,
}

impl ProgressionService {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        reward_config: RewardConfig,
        leveling_config: LevelingConfig,
    ) -> Self {
        Self {
            rewards: RewardService::new(store.clone(), RewardCalculator::new(reward_config)),
            leveling: LevelingService::new(store.clone(), LevelingCalculator::new(leveling_config)),
            store,
        }
    }

    pub fn rewards(&self) -> &RewardService {
        &self.rewards
    }

    pub fn leveling(&self) -> &LevelingService {
        &self.leveling
    }

    fn empty_rewards(&self, word_count: i32) -> MessageRewards {
        MessageRewards {
            word_count,
            golden_ink: 0,
            marble: 0,
            new_streak: 0,
            streak_updated: false,
            xp_earned: 0,
            level: 1,
            leveled_up: false,
            levels_gained: 0,
            xp_to_next_level: self.leveling.calculator().config().base_xp_per_level,
        }
    }

    /// Grants everything `text` earns today (UTC).
    pub async fn reward_message(&self, user_id: &str, text: &str) -> MessageRewards {
        self.reward_message_on(user_id, text, Utc::now().date_naive()).await
    }

    /// Grants everything `text` earns on `today`.
    ///
    /// The two halves are independent: when one fails it is logged and its
    /// fields keep their defaults while the other half still applies.
    pub async fn reward_message_on(
        &self,
        user_id: &str,
        text: &str,
        today: NaiveDate,
    ) -> MessageRewards {
        let word_count = word_count_of(text);
        let mut payload = self.empty_rewards(word_count);

        let (reward, level) = futures::join!(
            self.rewards.calculate_and_apply(user_id, word_count, today),
            self.leveling.award_xp(user_id, word_count),
        );

        match reward {
            Ok(applied) => {
                payload.golden_ink = applied.granted.golden_ink_delta;
                payload.marble = applied.granted.marble_delta;
                payload.new_streak = applied.granted.new_streak;
                payload.streak_updated = applied.granted.streak_updated;
            }
            Err(e) => error!(user_id, error = %e, "Failed to apply message reward"),
        }

        match level {
            Ok(outcome) => {
                payload.xp_earned = outcome.xp_earned;
                payload.level = outcome.level;
                payload.leveled_up = outcome.leveled_up;
                payload.levels_gained = outcome.levels_gained;
                payload.xp_to_next_level = outcome.xp_to_next_level;
            }
            Err(e) => error!(user_id, error = %e, "Failed to award XP"),
        }

        payload
    }

    /// What `text` would earn on `today`, without granting any of it.
    pub async fn preview_message(
        &self,
        user_id: &str,
        text: &str,
        today: NaiveDate,
    ) -> PortResult<MessageRewards> {
        let word_count = word_count_of(text);
        let (prior, reward) = self.rewards.calculate(user_id, word_count, today).await?;
        let leveling = self.leveling.calculator();
        let level = leveling.preview_award(&prior, leveling.calculate_xp_from_words(word_count));

        Ok(MessageRewards {
            word_count,
            golden_ink: reward.golden_ink_delta,
            marble: reward.marble_delta,
            new_streak: reward.new_streak,
            streak_updated: reward.streak_updated,
            xp_earned: level.xp_earned,
            level: level.level,
            leveled_up: level.leveled_up,
            levels_gained: level.levels_gained,
            xp_to_next_level: level.xp_to_next_level,
        })
    }

    /// The user's stats with derived level progress, creating the record if needed.
    pub async fn snapshot(&self, user_id: &str) -> PortResult<ProgressSnapshot> {
        let progress = self.store.get_or_create(user_id).await?;
        let leveling = self.leveling.calculator();
        Ok(ProgressSnapshot {
            xp_to_next_level: leveling.xp_to_next_level(progress.level, progress.total_xp),
            level_progress: leveling.level_progress_percent(progress.level, progress.total_xp),
            progress,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserProgress;
    use crate::memory::InMemoryProgressStore;
    use crate::ports::{PortError, ProgressStore};
    use async_trait::async_trait;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn service(store: Arc<dyn ProgressStore>) -> ProgressionService {
        ProgressionService::new(store, RewardConfig::default(), LevelingConfig::default())
    }

    #[tokio::test]
    async fn test_twenty_five_words_pay_three_of_each() {
        let store = Arc::new(InMemoryProgressStore::new());
        let rewards = service(store.clone())
            .reward_message_on("user_a", &"kata ".repeat(25), day(5))
            .await;

        assert_eq!(rewards.word_count, 25);
        assert_eq!(rewards.golden_ink, 3);
        assert_eq!(rewards.xp_earned, 3);
        assert_eq!(rewards.marble, 1);
        assert_eq!(rewards.new_streak, 1);
        assert_eq!(rewards.level, 1);
        assert_eq!(rewards.xp_to_next_level, 97);

        let stored = store.get("user_a").await.unwrap();
        assert_eq!(stored.golden_ink, 3);
        assert_eq!(stored.total_xp, 3);
    }

    #[tokio::test]
    async fn test_preview_grants_nothing() {
        let store = Arc::new(InMemoryProgressStore::new());
        let progression = service(store.clone());

        let preview = progression.preview_message("user_a", "one two three", day(5)).await.unwrap();
        assert_eq!(preview.golden_ink, 1);
        assert_eq!(preview.marble, 1);
        assert_eq!(preview.xp_earned, 1);

        assert_eq!(store.get("user_a").await.unwrap(), UserProgress::new("user_a"));
    }

    #[tokio::test]
    async fn test_snapshot_reports_level_progress() {
        let store = Arc::new(InMemoryProgressStore::new());
        store.get_or_create("user_a").await.unwrap();
        store.add_xp("user_a", 250).await.unwrap();
        store.set_level("user_a", 3, 100).await.unwrap();

        let snapshot = service(store).snapshot("user_a").await.unwrap();

        assert_eq!(snapshot.progress.level, 3);
        assert_eq!(snapshot.xp_to_next_level, 50);
        assert_eq!(snapshot.level_progress, 50);
    }

    /// Serves reads but refuses every currency write.
    struct InkOutage {
        inner: InMemoryProgressStore,
    }

    #[async_trait]
    impl ProgressStore for InkOutage {
        async fn get_or_create(&self, user_id: &str) -> PortResult<UserProgress> {
            self.inner.get_or_create(user_id).await
        }
        async fn get(&self, user_id: &str) -> PortResult<UserProgress> {
            self.inner.get(user_id).await
        }
        async fn add_golden_ink(&self, _user_id: &str, _delta: i32) -> PortResult<UserProgress> {
            Err(PortError::Store("connection reset".to_string()))
        }
        async fn add_marble(&self, _user_id: &str, _delta: i32) -> PortResult<UserProgress> {
            Err(PortError::Store("connection reset".to_string()))
        }
        async fn update_streak(
            &self,
            user_id: &str,
            new_streak: i32,
            active_date: NaiveDate,
            expected_last_active: Option<NaiveDate>,
        ) -> PortResult<UserProgress> {
            self.inner
                .update_streak(user_id, new_streak, active_date, expected_last_active)
                .await
        }
        async fn add_xp(&self, user_id: &str, delta: i32) -> PortResult<UserProgress> {
            self.inner.add_xp(user_id, delta).await
        }
        async fn set_level(&self, user_id: &str, level: i32, base_xp_per_level: i32)
            -> PortResult<UserProgress> {
            self.inner.set_level(user_id, level, base_xp_per_level).await
        }
    }

    #[tokio::test]
    async fn test_currency_failure_still_awards_xp() {
        let store = Arc::new(InkOutage { inner: InMemoryProgressStore::new() });
        let rewards = service(store.clone())
            .reward_message_on("user_a", "a short entry", day(5))
            .await;

        assert_eq!(rewards.golden_ink, 0);
        assert_eq!(rewards.marble, 0);
        assert_eq!(rewards.xp_earned, 1);
        assert_eq!(store.get("user_a").await.unwrap().total_xp, 1);
    }
}
