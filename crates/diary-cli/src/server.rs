//! HTTP forwarding endpoints
//!
//! Exposes the AI feedback gateway and the spreadsheet sync over HTTP so a
//! browser front end can call them without holding the upstream URLs.
//! Failures are returned as `{"error": ...}` with the mapped status.

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use serde_json::{json, Value};
use tracing::{error, info};

use diary_core::{
    AdditionFeedbackRequest, Config, FeedbackError, FeedbackReply, FeedbackRequest, GeminiClient,
    SpreadsheetClient, SpreadsheetSyncRequest, SyncError,
};

type ApiError = (StatusCode, Json<Value>);

#[derive(Clone)]
pub struct AppState {
    pub gemini: GeminiClient,
    pub sheets: SpreadsheetClient,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            gemini: GeminiClient::from_config(config),
            sheets: SpreadsheetClient::new(),
        }
    }
}

/// Create the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/gemini/feedback", post(diary_feedback))
        .route("/api/gemini/addition-feedback", post(addition_feedback))
        .route("/api/spreadsheet/sync", post(spreadsheet_sync))
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "forwarding server listening");
    axum::serve(listener, router(AppState::from_config(config))).await?;
    Ok(())
}

async fn diary_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackReply>, ApiError> {
    info!("POST /api/gemini/feedback");
    state
        .gemini
        .diary_feedback(&request)
        .await
        .map(Json)
        .map_err(feedback_error)
}

async fn addition_feedback(
    State(state): State<AppState>,
    Json(request): Json<AdditionFeedbackRequest>,
) -> Result<Json<FeedbackReply>, ApiError> {
    info!("POST /api/gemini/addition-feedback");
    state
        .gemini
        .addition_feedback(&request)
        .await
        .map(Json)
        .map_err(feedback_error)
}

async fn spreadsheet_sync(
    State(state): State<AppState>,
    Json(request): Json<SpreadsheetSyncRequest>,
) -> Result<Json<Value>, ApiError> {
    info!("POST /api/spreadsheet/sync");
    state
        .sheets
        .sync(&request)
        .await
        .map(|()| Json(json!({ "success": true })))
        .map_err(sync_error)
}

fn feedback_error(e: FeedbackError) -> ApiError {
    let status = status_from(e.status_code());
    if status.is_server_error() {
        error!("Gemini API error: {}", e);
    }
    (status, Json(json!({ "error": e.user_message() })))
}

fn sync_error(e: SyncError) -> ApiError {
    error!("Spreadsheet sync error: {}", e);
    (
        status_from(e.status_code()),
        Json(json!({ "error": e.user_message() })),
    )
}

fn status_from(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
