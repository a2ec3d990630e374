//! Messages submitted through the journal end up in the weekly summary.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use journal_core::memory::{InMemoryProgressStore, InMemorySummaryStore};
use journal_core::summaries::SummaryOutcome;
use journal_core::{
    JournalService, LevelingConfig, PortResult, ProgressionService, RewardConfig, SummarySchema,
    TextGenerator, WeekWindower, WeeklySummaryOrchestrator,
};

struct EchoingGenerator;

#[async_trait]
impl TextGenerator for EchoingGenerator {
    async fn complete_structured(&self, prompt: &str, _schema: &SummarySchema)
        -> PortResult<String> {
        assert!(prompt.contains("The deadline moved again."));
        assert!(prompt.contains("Slept well for once."));
        Ok(r#"{"summary":"A week of deadlines and better sleep.",
            "dominant_emotion":"relieved","secondary_emotions":["tired"],
            "trend":"improving","insights":["Sleep helped"],
            "encouragement":"Keep the evenings quiet."}"#
            .to_string())
    }
}

fn utc(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
}

#[tokio::test]
async fn test_submitted_messages_feed_last_weeks_summary() {
    let progress = Arc::new(InMemoryProgressStore::new());
    let journal_store = Arc::new(InMemorySummaryStore::new());
    let progression =
        ProgressionService::new(progress, RewardConfig::default(), LevelingConfig::default());
    let journal = JournalService::new(journal_store.clone(), progression);

    // Monday and Tuesday of the week 2025-03-02..08 (Asia/Jakarta).
    for (at, text) in [
        (utc(3, 3), "The deadline moved again."),
        (utc(3, 9), "Still thinking about it."),
        (utc(4, 3), "Slept well for once."),
    ] {
        journal.submit_message("user_a", text, at).await.unwrap();
    }

    let orchestrator = WeeklySummaryOrchestrator::new(
        journal_store,
        Arc::new(EchoingGenerator),
        WeekWindower::default(),
    )
    .unwrap();

    let outcome = orchestrator.generate_or_get("user_a", utc(12, 2)).await.unwrap();
    let summary = match outcome {
        SummaryOutcome::Generated(summary) => summary,
        other => panic!("expected a generated summary, got {:?}", other),
    };
    assert_eq!(summary.session_count, 2);
    assert_eq!(summary.message_count, 3);
    assert_eq!(summary.emotions.dominant_emotion, "relieved");
}
