//! crates/journal_core/src/leveling.rs
//!
//! XP awards and the linear level curve.
//!
//! Level `N` needs `(N - 1) * base_xp_per_level` lifetime XP, so level 1 is
//! free, level 2 needs 100, level 3 needs 200 and so on under the defaults.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{LevelOutcome, UserProgress};
use crate::ports::{PortError, PortResult, ProgressStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelingConfig {
    /// Words needed for each XP on top of the per-message base of 1.
    pub xp_per_word: i32,
    pub base_xp_per_level: i32,
}

impl Default for LevelingConfig {
    fn default() -> Self {
        Self {
            xp_per_word: 10,
            base_xp_per_level: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LevelingCalculator {
    config: LevelingConfig,
}

impl LevelingCalculator {
    pub fn new(config: LevelingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LevelingConfig {
        &self.config
    }

    /// Lifetime XP needed to reach `level`.
    pub fn xp_required_for_level(&self, level: i32) -> i32 {
        if level <= 1 {
            return 0;
        }
        (level - 1).saturating_mul(self.config.base_xp_per_level)
    }

    /// The highest level whose requirement `total_xp` meets.
    pub fn calculate_level_from_xp(&self, total_xp: i32) -> i32 {
        // A flat curve would never terminate the search.
        if self.config.base_xp_per_level <= 0 {
            return 1;
        }
        if total_xp <= 0 {
            return 1;
        }
        (total_xp / self.config.base_xp_per_level).saturating_add(1)
    }

    pub fn calculate_xp_from_words(&self, word_count: i32) -> i32 {
        if word_count <= 0 {
            return 0;
        }
        let bonus = if self.config.xp_per_word > 0 {
            word_count / self.config.xp_per_word
        } else {
            0
        };
        1 + bonus
    }

    /// Absolute XP still missing for `level + 1`. Negative when `total_xp`
    /// already passed that threshold, which means the stored level is stale.
    pub fn xp_to_next_level(&self, level: i32, total_xp: i32) -> i32 {
        self.xp_required_for_level(level.saturating_add(1)) - total_xp
    }

    /// XP earned inside `level`.
    pub fn xp_into_level(&self, level: i32, total_xp: i32) -> i32 {
        total_xp - self.xp_required_for_level(level)
    }

    /// Progress from `level` towards the next one, in whole percent (0-100).
    pub fn level_progress_percent(&self, level: i32, total_xp: i32) -> i32 {
        let floor = self.xp_required_for_level(level);
        let span = self.xp_required_for_level(level.saturating_add(1)) - floor;
        if span <= 0 {
            return 100;
        }
        let progress = i64::from(total_xp - floor) * 100 / i64::from(span);
        progress.clamp(0, 100) as i32
    }

    /// Level info for a record without any XP change.
    pub fn describe(&self, progress: &UserProgress) -> LevelOutcome {
        LevelOutcome {
            xp_earned: 0,
            current_xp: progress.current_xp,
            total_xp: progress.total_xp,
            level: progress.level,
            leveled_up: false,
            levels_gained: 0,
            xp_to_next_level: self.xp_to_next_level(progress.level, progress.total_xp),
        }
    }

    /// What awarding `xp_earned` on top of `prior` leads to, without a store.
    pub fn preview_award(&self, prior: &UserProgress, xp_earned: i32) -> LevelOutcome {
        if xp_earned <= 0 {
            return self.describe(prior);
        }
        let total_xp = prior.total_xp.saturating_add(xp_earned);
        let level = self.calculate_level_from_xp(total_xp).max(prior.level);
        let leveled_up = level > prior.level;
        LevelOutcome {
            xp_earned,
            current_xp: self.xp_into_level(level, total_xp),
            total_xp,
            level,
            leveled_up,
            levels_gained: if leveled_up { level - prior.level } else { 0 },
            xp_to_next_level: self.xp_to_next_level(level, total_xp),
        }
    }
}

//=========================================================================================
// Store-backed Service
//=========================================================================================

#[derive(Clone)]
pub struct LevelingService {
    store: Arc<dyn ProgressStore>,
    calculator: LevelingCalculator,
}

impl LevelingService {
    pub fn new(store: Arc<dyn ProgressStore>, calculator: LevelingCalculator) -> Self {
        Self { store, calculator }
    }

    pub fn calculator(&self) -> &LevelingCalculator {
        &self.calculator
    }

    /// Grants the XP a message of `word_count` words earns and levels the
    /// user up when the new total crosses one or more thresholds.
    pub async fn award_xp(&self, user_id: &str, word_count: i32) -> PortResult<LevelOutcome> {
        let xp_earned = self.calculator.calculate_xp_from_words(word_count);
        if xp_earned <= 0 {
            return self.current_level(user_id).await;
        }

        let prior = self.store.get_or_create(user_id).await?;
        let old_level = prior.level;

        let mut progress = self.store.add_xp(user_id, xp_earned).await?;

        let new_level = self.calculator.calculate_level_from_xp(progress.total_xp);
        let leveled_up = new_level > old_level;
        let mut levels_gained = 0;

        if leveled_up {
            levels_gained = new_level - old_level;
            // The store keeps the higher level and rederives `current_xp` from
            // its own total, so a slower concurrent award cannot roll it back.
            progress = self
                .store
                .set_level(user_id, new_level, self.calculator.config().base_xp_per_level)
                .await?;
            info!(user_id, old_level, new_level, "User leveled up");
        }

        debug!(user_id, xp_earned, total_xp = progress.total_xp, "Awarded XP");

        Ok(LevelOutcome {
            xp_earned,
            current_xp: progress.current_xp,
            total_xp: progress.total_xp,
            level: progress.level,
            leveled_up,
            levels_gained,
            xp_to_next_level: self
                .calculator
                .xp_to_next_level(progress.level, progress.total_xp),
        })
    }

    /// Current level info. An unknown user reads as a fresh level-1 record.
    pub async fn current_level(&self, user_id: &str) -> PortResult<LevelOutcome> {
        match self.store.get(user_id).await {
            Ok(progress) => Ok(self.calculator.describe(&progress)),
            Err(PortError::NotFound(_)) => Ok(LevelOutcome {
                xp_earned: 0,
                current_xp: 0,
                total_xp: 0,
                level: 1,
                leveled_up: false,
                levels_gained: 0,
                xp_to_next_level: self.calculator.config().base_xp_per_level,
            }),
            Err(e) => Err(e),
        }
    }
}
