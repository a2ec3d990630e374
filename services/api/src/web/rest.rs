//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{middleware::UserId, state::AppState};
use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use journal_core::{
    ports::PortError, MessageRewards, ProgressSnapshot, SubmittedMessage, SummaryOutcome, Trend,
    WeeklyEmotions, WeeklySummary,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

/// Longest journal message accepted, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 1000;

const NO_SUMMARY_MESSAGE: &str =
    "No journal entries last week. Start writing to receive your weekly summary!";

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        user_stats_handler,
        reward_message_handler,
        preview_rewards_handler,
        list_summaries_handler,
        latest_summary_handler,
    ),
    components(
        schemas(
            UserStatsResponse,
            MessageRequest,
            RewardsResponse,
            SubmittedMessageResponse,
            EmotionsResponse,
            WeeklySummaryResponse,
            ListSummariesResponse,
            NoSummaryResponse,
        )
    ),
    tags(
        (name = "Journal API", description = "Progression rewards and weekly reflections for journal writers.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A user's currencies, streak, and level progress.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserStatsResponse {
    pub user_id: String,
    pub golden_ink: i32,
    pub marble: i32,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub level: i32,
    pub current_xp: i32,
    pub total_xp: i32,
    pub last_active_date: Option<NaiveDate>,
    pub xp_to_next_level: i32,
    /// Percent of the current level completed, 0-100.
    pub level_progress: i32,
}

impl From<ProgressSnapshot> for UserStatsResponse {
    fn from(snapshot: ProgressSnapshot) -> Self {
        let p = snapshot.progress;
        Self {
            user_id: p.user_id,
            golden_ink: p.golden_ink,
            marble: p.marble,
            current_streak: p.current_streak,
            longest_streak: p.longest_streak,
            level: p.level,
            current_xp: p.current_xp,
            total_xp: p.total_xp,
            last_active_date: p.last_active_date,
            xp_to_next_level: snapshot.xp_to_next_level,
            level_progress: snapshot.level_progress,
        }
    }
}

/// A journal message to reward.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MessageRequest {
    pub content: String,
}

/// Everything one message earned.
#[derive(Debug, Serialize, ToSchema)]
pub struct RewardsResponse {
    pub word_count: i32,
    pub golden_ink: i32,
    pub marble: i32,
    pub new_streak: i32,
    pub streak_updated: bool,
    pub xp_earned: i32,
    pub level: i32,
    pub leveled_up: bool,
    pub levels_gained: i32,
    pub xp_to_next_level: i32,
}

impl From<MessageRewards> for RewardsResponse {
    fn from(r: MessageRewards) -> Self {
        Self {
            word_count: r.word_count,
            golden_ink: r.golden_ink,
            marble: r.marble,
            new_streak: r.new_streak,
            streak_updated: r.streak_updated,
            xp_earned: r.xp_earned,
            level: r.level,
            leveled_up: r.leveled_up,
            levels_gained: r.levels_gained,
            xp_to_next_level: r.xp_to_next_level,
        }
    }
}

/// The saved message and what it earned.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmittedMessageResponse {
    pub session_id: Uuid,
    pub message_id: Uuid,
    pub rewards: RewardsResponse,
}

impl From<SubmittedMessage> for SubmittedMessageResponse {
    fn from(m: SubmittedMessage) -> Self {
        Self {
            session_id: m.entry.session_id,
            message_id: m.entry.message_id,
            rewards: m.rewards.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmotionsResponse {
    pub dominant_emotion: String,
    pub secondary_emotions: Vec<String>,
    /// One of `improving`, `stable`, `challenging`.
    pub trend: String,
    pub insights: Vec<String>,
    pub encouragement: String,
}

impl From<WeeklyEmotions> for EmotionsResponse {
    fn from(e: WeeklyEmotions) -> Self {
        let trend = match e.trend {
            Trend::Improving => "improving",
            Trend::Stable => "stable",
            Trend::Challenging => "challenging",
        };
        Self {
            dominant_emotion: e.dominant_emotion,
            secondary_emotions: e.secondary_emotions,
            trend: trend.to_string(),
            insights: e.insights,
            encouragement: e.encouragement,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WeeklySummaryResponse {
    pub id: Uuid,
    pub user_id: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub summary: String,
    pub session_count: i32,
    pub message_count: i32,
    pub emotions: EmotionsResponse,
    pub created_at: DateTime<Utc>,
}

impl From<WeeklySummary> for WeeklySummaryResponse {
    fn from(s: WeeklySummary) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            week_start: s.week_start,
            week_end: s.week_end,
            summary: s.summary_text,
            session_count: s.session_count,
            message_count: s.message_count,
            emotions: s.emotions.into(),
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListSummariesResponse {
    pub summaries: Vec<WeeklySummaryResponse>,
    /// Number of summaries in this page.
    pub total: usize,
}

/// Returned by the latest-summary route when last week holds no writing.
#[derive(Debug, Serialize, ToSchema)]
pub struct NoSummaryResponse {
    pub summary: Option<WeeklySummaryResponse>,
    pub message: String,
}

impl NoSummaryResponse {
    fn new() -> Self {
        Self {
            summary: None,
            message: NO_SUMMARY_MESSAGE.to_string(),
        }
    }
}

/// Pagination for the summary list. Unparseable or out-of-range values fall
/// back to the defaults instead of failing the request.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListSummariesQuery {
    /// Page size, 1-50 (default 10).
    pub limit: Option<String>,
    /// Rows to skip (default 0).
    pub offset: Option<String>,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Checks a submitted message before anything is rewarded.
pub fn validate_content(content: &str) -> Result<(), (StatusCode, String)> {
    if content.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "content must not be empty".to_string()));
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("content must be at most {} characters", MAX_MESSAGE_LENGTH),
        ));
    }
    Ok(())
}

/// Logs the detail and returns a generic 500.
fn internal_error(action: &str, e: PortError) -> (StatusCode, String) {
    error!("Failed to {}: {:?}", action, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Failed to {}", action),
    )
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Get the caller's stats, creating an empty record on first access.
#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, description = "Current stats", body = UserStatsResponse),
        (status = 400, description = "Missing x-user-id header"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = String, Header, description = "The unique ID of the user.")
    )
)]
pub async fn user_stats_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> Result<Json<UserStatsResponse>, (StatusCode, String)> {
    let snapshot = app_state
        .progression
        .snapshot(&user_id)
        .await
        .map_err(|e| internal_error("get user stats", e))?;
    Ok(Json(snapshot.into()))
}

/// Save a journal message into today's session and reward it: golden ink,
/// the daily streak and marble, and XP.
///
/// A failed save is a 500 and grants nothing. Reward failures never fail the
/// request; the affected half of the payload keeps its defaults.
#[utoipa::path(
    post,
    path = "/messages/rewards",
    request_body = MessageRequest,
    responses(
        (status = 200, description = "Message saved and rewards granted", body = SubmittedMessageResponse),
        (status = 400, description = "Missing header, or empty or oversized content"),
        (status = 500, description = "The message could not be saved")
    ),
    params(
        ("x-user-id" = String, Header, description = "The unique ID of the user.")
    )
)]
pub async fn reward_message_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(payload): Json<MessageRequest>,
) -> Result<Json<SubmittedMessageResponse>, (StatusCode, String)> {
    validate_content(&payload.content)?;
    let submitted = app_state
        .journal
        .submit_message(&user_id, &payload.content, Utc::now())
        .await
        .map_err(|e| internal_error("save message", e))?;
    let rewards = &submitted.rewards;
    info!(
        user_id = %user_id,
        session_id = %submitted.entry.session_id,
        words = rewards.word_count,
        golden_ink = rewards.golden_ink,
        marble = rewards.marble,
        xp = rewards.xp_earned,
        "Message rewarded"
    );
    Ok(Json(submitted.into()))
}

/// Show what a message would earn today without granting anything.
#[utoipa::path(
    post,
    path = "/messages/rewards/preview",
    request_body = MessageRequest,
    responses(
        (status = 200, description = "Projected rewards", body = RewardsResponse),
        (status = 400, description = "Missing header, or empty or oversized content"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = String, Header, description = "The unique ID of the user.")
    )
)]
pub async fn preview_rewards_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(payload): Json<MessageRequest>,
) -> Result<Json<RewardsResponse>, (StatusCode, String)> {
    validate_content(&payload.content)?;
    let rewards = app_state
        .progression
        .preview_message(&user_id, &payload.content, Utc::now().date_naive())
        .await
        .map_err(|e| internal_error("preview rewards", e))?;
    Ok(Json(rewards.into()))
}

/// List stored weekly summaries, newest week first.
#[utoipa::path(
    get,
    path = "/summaries",
    params(
        ListSummariesQuery,
        ("x-user-id" = String, Header, description = "The unique ID of the user.")
    ),
    responses(
        (status = 200, description = "A page of summaries", body = ListSummariesResponse),
        (status = 400, description = "Missing x-user-id header"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_summaries_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Query(query): Query<ListSummariesQuery>,
) -> Result<Json<ListSummariesResponse>, (StatusCode, String)> {
    let limit = query.limit.and_then(|l| l.trim().parse::<i64>().ok());
    let offset = query.offset.and_then(|o| o.trim().parse::<i64>().ok());

    let summaries = app_state
        .summaries
        .list_summaries(&user_id, limit, offset)
        .await
        .map_err(|e| internal_error("list summaries", e))?;

    let summaries: Vec<WeeklySummaryResponse> = summaries.into_iter().map(Into::into).collect();
    Ok(Json(ListSummariesResponse {
        total: summaries.len(),
        summaries,
    }))
}

/// Get the summary of the last completed week, generating it on first request.
///
/// Without a configured AI key nothing is generated; only a summary already
/// stored for that week is returned.
#[utoipa::path(
    get,
    path = "/summaries/latest",
    responses(
        (status = 200, description = "Last week's summary, or a `NoSummaryResponse` when last week holds no writing", body = WeeklySummaryResponse),
        (status = 400, description = "Missing x-user-id header"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = String, Header, description = "The unique ID of the user.")
    )
)]
pub async fn latest_summary_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> Result<Response, (StatusCode, String)> {
    if !app_state.generation_enabled {
        let stored = app_state
            .summaries
            .find_completed(&user_id, Utc::now())
            .await
            .map_err(|e| internal_error("get latest summary", e))?;
        return Ok(match stored {
            Some(summary) => Json(WeeklySummaryResponse::from(summary)).into_response(),
            None => Json(NoSummaryResponse::new()).into_response(),
        });
    }

    let outcome = app_state
        .summaries
        .generate_or_get(&user_id, Utc::now())
        .await
        .map_err(|e| internal_error("generate summary", e))?;

    Ok(match outcome {
        SummaryOutcome::EmptyWeek(_) => Json(NoSummaryResponse::new()).into_response(),
        other => Json(WeeklySummaryResponse::from(other.into_summary())).into_response(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use journal_core::memory::{InMemoryProgressStore, InMemorySummaryStore};
    use journal_core::ports::{PortResult, ProgressStore, SummaryStore, TextGenerator};
    use journal_core::{
        JournalService, LevelingConfig, NewWeeklySummary, ProgressionService, RewardConfig,
        SummarySchema, UserProgress, WeekWindower, WeeklySummaryOrchestrator,
    };

    struct NoGenerator;

    #[async_trait]
    impl TextGenerator for NoGenerator {
        async fn complete_structured(&self, _prompt: &str, _schema: &SummarySchema)
            -> PortResult<String> {
            panic!("generation is disabled in these tests");
        }
    }

    fn offline_state(
        progress: Arc<InMemoryProgressStore>,
        journal: Arc<InMemorySummaryStore>,
    ) -> Arc<AppState> {
        let progression =
            ProgressionService::new(progress, RewardConfig::default(), LevelingConfig::default());
        Arc::new(AppState {
            journal: JournalService::new(journal.clone(), progression.clone()),
            progression,
            summaries: WeeklySummaryOrchestrator::new(
                journal,
                Arc::new(NoGenerator),
                WeekWindower::default(),
            )
            .unwrap(),
            generation_enabled: false,
        })
    }

    fn user() -> Extension<UserId> {
        Extension(UserId("user_a".to_string()))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rewarded_message_is_saved_to_a_session() {
        let progress = Arc::new(InMemoryProgressStore::new());
        let journal = Arc::new(InMemorySummaryStore::new());
        let state = offline_state(progress.clone(), journal.clone());

        let Json(response) = reward_message_handler(
            State(state),
            user(),
            Json(MessageRequest { content: "ten words would be nice but three".to_string() }),
        )
        .await
        .unwrap();

        assert_eq!(response.rewards.golden_ink, 1);
        assert_eq!(journal.session_count("user_a").await, 1);
        assert_eq!(journal.session_golden_ink(response.session_id).await, Some(1));
        assert_eq!(progress.get("user_a").await.unwrap().golden_ink, 1);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["rewards"]["word_count"], 7);
        assert!(json["message_id"].is_string());
    }

    #[tokio::test]
    async fn test_offline_latest_ignores_older_weeks() {
        let journal = Arc::new(InMemorySummaryStore::new());
        let long_ago = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        journal
            .create(NewWeeklySummary {
                user_id: "user_a".to_string(),
                week_start: long_ago,
                week_end: long_ago + chrono::Duration::days(6),
                summary_text: "a winter week".to_string(),
                session_count: 1,
                message_count: 2,
                emotions: WeeklyEmotions::neutral(),
            })
            .await
            .unwrap();
        let state = offline_state(Arc::new(InMemoryProgressStore::new()), journal);

        let response = latest_summary_handler(State(state), user()).await.unwrap();
        let json = body_json(response).await;

        assert!(json["summary"].is_null());
        assert_eq!(json["message"], NO_SUMMARY_MESSAGE);
    }

    #[tokio::test]
    async fn test_offline_latest_returns_last_weeks_stored_summary() {
        let journal = Arc::new(InMemorySummaryStore::new());
        let state = offline_state(Arc::new(InMemoryProgressStore::new()), journal.clone());
        let week = state.summaries.windower().last_completed_week(Utc::now());
        journal
            .create(NewWeeklySummary {
                user_id: "user_a".to_string(),
                week_start: week.start_date(),
                week_end: week.end_date(),
                summary_text: "last week".to_string(),
                session_count: 3,
                message_count: 4,
                emotions: WeeklyEmotions::neutral(),
            })
            .await
            .unwrap();

        let response = latest_summary_handler(State(state), user()).await.unwrap();
        let json = body_json(response).await;

        assert_eq!(json["summary"], "last week");
        assert_eq!(json["message_count"], 4);
    }

    #[test]
    fn test_content_validation() {
        assert!(validate_content("dear diary").is_ok());
        assert_eq!(validate_content("  \n").unwrap_err().0, StatusCode::BAD_REQUEST);

        // The limit counts characters, not bytes.
        let at_limit = "é".repeat(MAX_MESSAGE_LENGTH);
        assert!(validate_content(&at_limit).is_ok());
        let over = "a".repeat(MAX_MESSAGE_LENGTH + 1);
        assert_eq!(validate_content(&over).unwrap_err().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_stats_response_flattens_snapshot() {
        let mut progress = UserProgress::new("user_a");
        progress.golden_ink = 12;
        progress.total_xp = 150;
        progress.level = 2;
        let response = UserStatsResponse::from(ProgressSnapshot {
            progress,
            xp_to_next_level: 50,
            level_progress: 50,
        });

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["user_id"], "user_a");
        assert_eq!(json["golden_ink"], 12);
        assert_eq!(json["xp_to_next_level"], 50);
        assert_eq!(json["level_progress"], 50);
    }

    #[test]
    fn test_no_summary_response_shape() {
        let json = serde_json::to_value(NoSummaryResponse::new()).unwrap();
        assert!(json["summary"].is_null());
        assert_eq!(json["message"], NO_SUMMARY_MESSAGE);
    }

    #[test]
    fn test_trend_is_rendered_lowercase() {
        let mut emotions = WeeklyEmotions::neutral();
        emotions.trend = Trend::Challenging;
        assert_eq!(EmotionsResponse::from(emotions).trend, "challenging");
    }

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/stats",
            "/messages/rewards",
            "/messages/rewards/preview",
            "/summaries",
            "/summaries/latest",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
