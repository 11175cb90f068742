//! HTTP routes.
//!
//! - `POST /start/{session_id}` starts (or restarts) a story
//! - `POST /prompt/{session_id}` continues it with a plain-text choice
//! - `DELETE /session/{session_id}` forgets a session
//! - `GET /health` reports liveness and the session count

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use log::{debug, info};
use serde_json::json;
use std::sync::Arc;
use story_core::{
    GeneratorError, InvalidSessionId, SessionId, StoryError, StoryOrchestrator, StoryReply,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<StoryOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: StoryOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/start/:session_id", post(start))
        .route("/prompt/:session_id", post(prompt))
        .route("/session/:session_id", delete(end_session))
        .route("/health", get(health))
        .with_state(state)
}

/// A [`StoryError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(StoryError);

impl From<StoryError> for ApiError {
    fn from(e: StoryError) -> Self {
        Self(e)
    }
}

impl From<InvalidSessionId> for ApiError {
    fn from(e: InvalidSessionId) -> Self {
        Self(StoryError::InvalidRequest(e.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            StoryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            // A missing or rejected key is our fault, not the upstream's
            StoryError::UpstreamUnavailable(GeneratorError::Config(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            StoryError::UpstreamUnavailable(_) | StoryError::MalformedReply(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        debug!("responding {status}: {}", self.0);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn start(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<StoryReply>, ApiError> {
    let id = SessionId::parse(raw_id)?;
    info!("POST /start/{id}");
    let reply = state.orchestrator.start(&id).await?;
    Ok(Json(reply))
}

async fn prompt(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    body: String,
) -> Result<Json<StoryReply>, ApiError> {
    let id = SessionId::parse(raw_id)?;
    info!("POST /prompt/{id}");
    let reply = state.orchestrator.continue_story(&id, &body).await?;
    Ok(Json(reply))
}

async fn end_session(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = SessionId::parse(raw_id)?;
    info!("DELETE /session/{id}");
    if state.orchestrator.end_session(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.orchestrator.session_count(),
    }))
}
