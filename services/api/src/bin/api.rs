//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{db::DbAdapter, summary_llm::OpenAiSummaryAdapter},
    config::Config,
    error::ApiError,
    web::{
        latest_summary_handler, list_summaries_handler, preview_rewards_handler,
        require_user, reward_message_handler, rest::ApiDoc, state::AppState, user_stats_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{header::{ACCEPT, CONTENT_TYPE}, HeaderName, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use journal_core::{JournalService, ProgressionService, WeekWindower, WeekZone, WeeklySummaryOrchestrator};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Summary Generator ---
    let mut openai_config = OpenAIConfig::new();
    if let Some(key) = config.openai_api_key.as_ref() {
        openai_config = openai_config.with_api_key(key);
    }
    if let Some(base) = config.ai_api_base.as_ref() {
        openai_config = openai_config.with_api_base(base);
    }
    let generation_enabled = config.openai_api_key.is_some();
    if !generation_enabled {
        warn!("OPENAI_API_KEY is not set; weekly summaries will not be generated");
    }
    let summary_adapter = Arc::new(OpenAiSummaryAdapter::new(
        Client::with_config(openai_config),
        config.summary_model.clone(),
        config.summary_fallback_model.clone(),
    ));

    // --- 4. Build the Engine Services & Shared AppState ---
    let progression =
        ProgressionService::new(db_adapter.clone(), config.rewards, config.leveling);
    let journal = JournalService::new(db_adapter.clone(), progression.clone());
    let windower = WeekWindower::new(WeekZone::from_name(&config.summary_timezone));
    let summaries = WeeklySummaryOrchestrator::new(db_adapter, summary_adapter, windower)?;

    let app_state = Arc::new(AppState {
        journal,
        progression,
        summaries,
        generation_enabled,
    });

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, HeaderName::from_static("x-user-id")]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/stats", get(user_stats_handler))
        .route("/messages/rewards", post(reward_message_handler))
        .route("/messages/rewards/preview", post(preview_rewards_handler))
        .route("/summaries", get(list_summaries_handler))
        .route("/summaries/latest", get(latest_summary_handler))
        .layer(axum_middleware::from_fn(require_user))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
