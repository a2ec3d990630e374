pub mod domain;
pub mod journal;
pub mod leveling;
pub mod memory;
pub mod ports;
pub mod progression;
pub mod rewards;
pub mod schema;
pub mod summaries;
pub mod weeks;
pub mod words;

pub use domain::{
    JournalEntry, LevelOutcome, MessageRewards, NewWeeklySummary, ProgressSnapshot,
    RewardOutcome, SubmittedMessage, Trend, UserProgress, WeekActivity, WeekBoundaries,
    WeeklyEmotions, WeeklySummary,
};
pub use journal::JournalService;
pub use leveling::{LevelingCalculator, LevelingConfig, LevelingService};
pub use ports::{
    JournalStore, PortError, PortResult, ProgressStore, SummaryStore, TextGenerator,
};
pub use progression::ProgressionService;
pub use rewards::{AppliedReward, RewardCalculator, RewardConfig, RewardService, StreakTransition};
pub use schema::{SummarySchema, WEEKLY_SUMMARY_SCHEMA};
pub use summaries::{SummaryOutcome, WeeklySummaryOrchestrator};
pub use weeks::{WeekWindower, WeekZone};
pub use words::count_words;
