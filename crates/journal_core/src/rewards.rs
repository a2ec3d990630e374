//! crates/journal_core/src/rewards.rs
//!
//! Golden ink, marble and daily streak rules.
//!
//! Calculation is pure: it looks at a prior `UserProgress` and a word count and
//! decides what the message earns. Application is a separate step against a
//! `ProgressStore`, so callers can preview a reward without granting it.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::domain::{RewardOutcome, UserProgress};
use crate::ports::{PortError, PortResult, ProgressStore};

/// Tunables for the currency rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardConfig {
    /// Words needed for each golden ink on top of the per-message base of 1.
    pub words_per_golden_ink: i32,
    /// Marble granted on every streak-advancing day.
    pub marble_base_reward: i32,
    /// One bonus marble per this many streak days.
    pub marble_streak_divisor: i32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            words_per_golden_ink: 10,
            marble_base_reward: 1,
            marble_streak_divisor: 7,
        }
    }
}

//=========================================================================================
// Streak Clock
//=========================================================================================

/// How a new activity day relates to the last rewarded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakTransition {
    /// No activity was ever recorded.
    FirstActivity,
    /// Already active today; also used when the stored date lies in the future.
    SameDay,
    /// Active yesterday.
    Continued,
    /// A gap of two or more days.
    Reset,
}

impl StreakTransition {
    pub fn between(last_active: Option<NaiveDate>, today: NaiveDate) -> Self {
        match last_active {
            None => Self::FirstActivity,
            Some(last) => match days_since_active(last, today) {
                d if d <= 0 => Self::SameDay,
                1 => Self::Continued,
                _ => Self::Reset,
            },
        }
    }
}

/// Whole calendar days between `last_active` and `today`.
pub fn days_since_active(last_active: NaiveDate, today: NaiveDate) -> i64 {
    (today - last_active).num_days()
}

//=========================================================================================
// Pure Calculator
//=========================================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct RewardCalculator {
    config: RewardConfig,
}

impl RewardCalculator {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Golden ink for one message: a base of 1 plus one per
    /// `words_per_golden_ink` words. Non-positive counts earn nothing.
    pub fn golden_ink_for(&self, word_count: i32) -> i32 {
        if word_count <= 0 {
            return 0;
        }
        let bonus = if self.config.words_per_golden_ink > 0 {
            word_count / self.config.words_per_golden_ink
        } else {
            0
        };
        1 + bonus
    }

    /// Marble for a streak-advancing day that lands on `new_streak`.
    fn marble_for_streak(&self, new_streak: i32) -> i32 {
        let bonus = if self.config.marble_streak_divisor > 0 {
            new_streak / self.config.marble_streak_divisor
        } else {
            0
        };
        self.config.marble_base_reward + bonus
    }

    pub fn calculate_message_reward(
        &self,
        prior: &UserProgress,
        word_count: i32,
        today: NaiveDate,
    ) -> RewardOutcome {
        let golden_ink_delta = self.golden_ink_for(word_count);
        let transition = StreakTransition::between(prior.last_active_date, today);

        let (new_streak, streak_updated, marble_delta) = match transition {
            StreakTransition::SameDay => (prior.current_streak, false, 0),
            StreakTransition::Continued => {
                let new_streak = prior.current_streak.saturating_add(1);
                (new_streak, true, self.marble_for_streak(new_streak))
            }
            StreakTransition::FirstActivity | StreakTransition::Reset => {
                (1, true, self.config.marble_base_reward)
            }
        };

        debug!(
            user_id = %prior.user_id,
            ?transition,
            word_count,
            golden_ink_delta,
            marble_delta,
            new_streak,
            "Calculated message reward"
        );

        RewardOutcome {
            golden_ink_delta,
            marble_delta,
            streak_updated,
            new_streak,
        }
    }
}

//=========================================================================================
// Store-backed Service
//=========================================================================================

/// The result of applying an outcome: the final record and what was granted.
///
/// `granted` can be smaller than the calculated outcome when a concurrent
/// request already advanced the streak for `today`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedReward {
    pub progress: UserProgress,
    pub granted: RewardOutcome,
}

#[derive(Clone)]
pub struct RewardService {
    store: Arc<dyn ProgressStore>,
    calculator: RewardCalculator,
}

impl RewardService {
    pub fn new(store: Arc<dyn ProgressStore>, calculator: RewardCalculator) -> Self {
        Self { store, calculator }
    }

    pub fn calculator(&self) -> &RewardCalculator {
        &self.calculator
    }

    /// Fetches (or lazily creates) the user's record and calculates against it.
    pub async fn calculate(
        &self,
        user_id: &str,
        word_count: i32,
        today: NaiveDate,
    ) -> PortResult<(UserProgress, RewardOutcome)> {
        let prior = self.store.get_or_create(user_id).await?;
        let outcome = self.calculator.calculate_message_reward(&prior, word_count, today);
        Ok((prior, outcome))
    }

    /// Applies an outcome that was calculated from `prior`.
    ///
    /// The streak write is guarded on `prior.last_active_date`; marble is only
    /// granted once that guarded write succeeds, so a day's marble and streak
    /// step happen at most once per user.
    pub async fn apply(
        &self,
        prior: &UserProgress,
        outcome: RewardOutcome,
        today: NaiveDate,
    ) -> PortResult<AppliedReward> {
        let user_id = prior.user_id.as_str();
        let mut progress = self.store.get_or_create(user_id).await?;
        let mut granted = outcome;

        if outcome.golden_ink_delta > 0 {
            progress = self
                .store
                .add_golden_ink(user_id, outcome.golden_ink_delta)
                .await?;
        }

        if outcome.streak_updated {
            match self
                .store
                .update_streak(user_id, outcome.new_streak, today, prior.last_active_date)
                .await
            {
                Ok(updated) => {
                    progress = updated;
                    if outcome.marble_delta > 0 {
                        progress = self.store.add_marble(user_id, outcome.marble_delta).await?;
                    }
                }
                Err(PortError::Conflict(reason)) => {
                    warn!(user_id, %reason, "Streak already advanced by a concurrent request");
                    // The winner wrote after our last read; report its streak.
                    progress = self.store.get(user_id).await?;
                    granted.streak_updated = false;
                    granted.marble_delta = 0;
                    granted.new_streak = progress.current_streak;
                }
                Err(e) => return Err(e),
            }
        } else if outcome.marble_delta > 0 {
            progress = self.store.add_marble(user_id, outcome.marble_delta).await?;
        }

        info!(
            user_id,
            golden_ink = granted.golden_ink_delta,
            marble = granted.marble_delta,
            streak = progress.current_streak,
            "Applied message reward"
        );

        Ok(AppliedReward { progress, granted })
    }

    /// Calculates and immediately applies the reward for one message.
    pub async fn calculate_and_apply(
        &self,
        user_id: &str,
        word_count: i32,
        today: NaiveDate,
    ) -> PortResult<AppliedReward> {
        let (prior, outcome) = self.calculate(user_id, word_count, today).await?;
        self.apply(&prior, outcome, today).await
    }
}
