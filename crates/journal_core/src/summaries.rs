//! crates/journal_core/src/summaries.rs
//!
//! Generate-or-get of the weekly summary for the last completed week.
//!
//! A persisted summary is an immutable snapshot: once a row exists for
//! `(user, week_start)` it is returned verbatim and never regenerated.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{
    NewWeeklySummary, Trend, WeekActivity, WeekBoundaries, WeeklyEmotions, WeeklySummary,
};
use crate::ports::{PortError, PortResult, SummaryStore, TextGenerator};
use crate::schema::{SummarySchema, WEEKLY_SUMMARY_SCHEMA};
use crate::weeks::WeekWindower;

pub const EMPTY_WEEK_SUMMARY: &str = "You didn't get to write last week. That's okay, \
sometimes a pause is what we need. Hope the coming week feels a little lighter.";

const SUMMARY_INSTRUCTIONS: &str = r#"You are a thoughtful friend who has been reading someone's journal for the past week.
Write their weekly summary as a short letter: 3-4 sentences that name the main emotional theme
of the week and offer a warm, validating perspective. Do not lecture and do not get philosophical.
Answer in the same language the journal entries are written in."#;

const MESSAGE_SEPARATOR: &str = "\n---\n";

const MAX_SECONDARY_EMOTIONS: usize = 3;
const MAX_INSIGHTS: usize = 3;

pub const DEFAULT_LIST_LIMIT: i64 = 10;
pub const MAX_LIST_LIMIT: i64 = 50;

/// Where the returned summary came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// Already stored, returned verbatim.
    Existing(WeeklySummary),
    /// Generated and stored by this call.
    Generated(WeeklySummary),
    /// The week holds no writing; canned and not stored.
    EmptyWeek(WeeklySummary),
}

impl SummaryOutcome {
    pub fn summary(&self) -> &WeeklySummary {
        match self {
            Self::Existing(s) | Self::Generated(s) | Self::EmptyWeek(s) => s,
        }
    }

    pub fn into_summary(self) -> WeeklySummary {
        match self {
            Self::Existing(s) | Self::Generated(s) | Self::EmptyWeek(s) => s,
        }
    }

    pub fn is_empty_week(&self) -> bool {
        matches!(self, Self::EmptyWeek(_))
    }
}

/// Wire shape of the structured completion.
#[derive(Debug, Deserialize)]
struct SummaryCompletion {
    summary: String,
    dominant_emotion: String,
    #[serde(default)]
    secondary_emotions: Vec<String>,
    trend: Trend,
    insights: Vec<String>,
    encouragement: String,
}

/// Parses and validates a completion into summary text plus emotions.
pub fn parse_completion(raw: &str) -> PortResult<(String, WeeklyEmotions)> {
    let completion: SummaryCompletion = serde_json::from_str(raw.trim())
        .map_err(|e| PortError::Generation(format!("malformed summary completion: {}", e)))?;

    let summary = completion.summary.trim().to_string();
    let dominant_emotion = completion.dominant_emotion.trim().to_string();
    let encouragement = completion.encouragement.trim().to_string();
    for (name, value) in [
        ("summary", &summary),
        ("dominant_emotion", &dominant_emotion),
        ("encouragement", &encouragement),
    ] {
        if value.is_empty() {
            return Err(PortError::Generation(format!("completion left '{}' empty", name)));
        }
    }

    let mut secondary_emotions = non_blank(completion.secondary_emotions);
    if secondary_emotions.len() > MAX_SECONDARY_EMOTIONS {
        warn!(count = secondary_emotions.len(), "Truncating secondary emotions");
        secondary_emotions.truncate(MAX_SECONDARY_EMOTIONS);
    }

    let mut insights = non_blank(completion.insights);
    if insights.is_empty() {
        return Err(PortError::Generation("completion has no insights".to_string()));
    }
    if insights.len() > MAX_INSIGHTS {
        warn!(count = insights.len(), "Truncating insights");
        insights.truncate(MAX_INSIGHTS);
    }

    Ok((
        summary,
        WeeklyEmotions {
            dominant_emotion,
            secondary_emotions,
            trend: completion.trend,
            insights,
            encouragement,
        },
    ))
}

fn non_blank(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Builds the completion prompt from the week's writing and counts.
pub fn build_prompt(texts: &[String], activity: WeekActivity, week: &WeekBoundaries) -> String {
    let entries: String = texts
        .iter()
        .map(|t| format!("{}{}", t.trim(), MESSAGE_SEPARATOR))
        .collect();
    format!(
        "{instructions}\n\nWEEK: {start} to {end}\nJOURNAL SESSIONS: {sessions}\nMESSAGES WRITTEN: {messages}\n\nJOURNAL ENTRIES THIS WEEK:\n{entries}",
        instructions = SUMMARY_INSTRUCTIONS,
        start = week.start_date(),
        end = week.end_date(),
        sessions = activity.session_count,
        messages = activity.message_count,
        entries = entries,
    )
}

#[derive(Clone)]
pub struct WeeklySummaryOrchestrator {
    store: Arc<dyn SummaryStore>,
    generator: Arc<dyn TextGenerator>,
    windower: WeekWindower,
    schema: SummarySchema,
}

impl WeeklySummaryOrchestrator {
    /// Creates the orchestrator, validating the completion schema up front.
    pub fn new(
        store: Arc<dyn SummaryStore>,
        generator: Arc<dyn TextGenerator>,
        windower: WeekWindower,
    ) -> PortResult<Self> {
        WEEKLY_SUMMARY_SCHEMA.validate()?;
        Ok(Self {
            store,
            generator,
            windower,
            schema: WEEKLY_SUMMARY_SCHEMA,
        })
    }

    pub fn windower(&self) -> &WeekWindower {
        &self.windower
    }

    /// Returns the summary of the last week completed before `now`,
    /// generating and storing it on first request.
    pub async fn generate_or_get(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> PortResult<SummaryOutcome> {
        let week = self.windower.last_completed_week(now);
        let week_start = week.start_date();

        if let Some(existing) = self.store.find(user_id, week_start).await? {
            debug!(user_id, %week_start, "Returning stored weekly summary");
            return Ok(SummaryOutcome::Existing(existing));
        }

        let activity = self
            .store
            .aggregate_counts(user_id, week.start, week.end)
            .await?;
        if activity.message_count == 0 {
            debug!(user_id, %week_start, "No writing last week, skipping generation");
            return Ok(SummaryOutcome::EmptyWeek(empty_week_summary(
                user_id, &week, activity, now,
            )));
        }

        let texts = self
            .store
            .fetch_message_texts(user_id, week.start, week.end)
            .await?;
        if texts.iter().all(|t| t.trim().is_empty()) {
            debug!(user_id, %week_start, "No user-authored text last week, skipping generation");
            return Ok(SummaryOutcome::EmptyWeek(empty_week_summary(
                user_id, &week, activity, now,
            )));
        }

        info!(
            user_id,
            %week_start,
            sessions = activity.session_count,
            messages = activity.message_count,
            "Generating weekly summary"
        );
        let prompt = build_prompt(&texts, activity, &week);
        let raw = self
            .generator
            .complete_structured(&prompt, &self.schema)
            .await?;
        let (summary_text, emotions) = parse_completion(&raw)?;

        let draft = NewWeeklySummary {
            user_id: user_id.to_string(),
            week_start,
            week_end: week.end_date(),
            summary_text,
            session_count: activity.session_count,
            message_count: activity.message_count,
            emotions,
        };

        match self.store.create(draft).await {
            Ok(created) => Ok(SummaryOutcome::Generated(created)),
            Err(PortError::Conflict(reason)) => {
                // A concurrent request stored this week first; its row wins.
                warn!(user_id, %week_start, %reason, "Weekly summary already stored, re-reading");
                self.store
                    .find(user_id, week_start)
                    .await?
                    .map(SummaryOutcome::Existing)
                    .ok_or_else(|| {
                        PortError::Store(format!(
                            "summary for week {} conflicted but could not be re-read",
                            week_start
                        ))
                    })
            }
            Err(e) => Err(e),
        }
    }

    /// Stored summaries, newest first. `limit` defaults to 10 and is capped at
    /// 50; out-of-range values fall back to the defaults.
    pub async fn list_summaries(
        &self,
        user_id: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> PortResult<Vec<WeeklySummary>> {
        let limit = limit
            .filter(|l| (1..=MAX_LIST_LIMIT).contains(l))
            .unwrap_or(DEFAULT_LIST_LIMIT);
        let offset = offset.filter(|o| *o >= 0).unwrap_or(0);
        self.store.list(user_id, limit, offset).await
    }

    /// The most recently stored summary, without generating anything.
    pub async fn latest_summary(&self, user_id: &str) -> PortResult<Option<WeeklySummary>> {
        self.store.latest(user_id).await
    }

    /// The stored summary of the last week completed before `now`, if any.
    /// Never generates; older weeks are not substituted.
    pub async fn find_completed(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Option<WeeklySummary>> {
        let week_start = self.windower.last_completed_week(now).start_date();
        self.store.find(user_id, week_start).await
    }
}

fn empty_week_summary(
    user_id: &str,
    week: &WeekBoundaries,
    activity: WeekActivity,
    now: DateTime<Utc>,
) -> WeeklySummary {
    WeeklySummary {
        id: Uuid::nil(),
        user_id: user_id.to_string(),
        week_start: week.start_date(),
        week_end: week.end_date(),
        summary_text: EMPTY_WEEK_SUMMARY.to_string(),
        session_count: activity.session_count,
        message_count: activity.message_count,
        emotions: WeeklyEmotions::neutral(),
        created_at: now,
    }
}
