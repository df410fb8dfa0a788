//! JSON handlers for turns, sessions and tools.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use socialos_agents::{ToolDefinition, TurnOutcome, TurnRequest};
use socialos_common::{ConversationState, Error, SessionId};
use socialos_db::SessionSummary;
use tracing::{error, warn};

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Agent(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Agent(err)
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Agent(Error::ModelUnavailable(_)) => (StatusCode::BAD_GATEWAY, "MODEL_UNAVAILABLE"),
            Self::Agent(Error::CheckpointUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "CHECKPOINT_UNAVAILABLE")
            }
            Self::Agent(Error::Cancelled) => (StatusCode::REQUEST_TIMEOUT, "CANCELLED"),
            Self::Agent(_) => (StatusCode::INTERNAL_SERVER_ERROR, "AGENT_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match self {
            Self::BadRequest(msg) | Self::NotFound(msg) => msg,
            Self::Agent(err) => err.to_string(),
        };
        if status.is_server_error() {
            error!(%status, "request failed: {message}");
        }

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });
        (status, body).into_response()
    }
}

/// `POST /api/sessions/{id}/turns`
pub async fn run_turn(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(mut request): Json<TurnRequest>,
) -> Result<Json<TurnOutcome>, ApiError> {
    if request.message.is_none() && request.tool_results.is_empty() {
        return Err(ApiError::BadRequest(
            "request needs a `message` or `tool_results`".to_string(),
        ));
    }
    request.session_id = SessionId::from(id);

    let outcome = state
        .runtime
        .run_turn_cancellable(request, state.shutdown.child_token())
        .await?;
    Ok(Json(outcome))
}

/// `GET /api/sessions/{id}`
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationState>, ApiError> {
    let session_id = SessionId::from(id);
    match state.runtime.load_session(&session_id).await? {
        Some(conversation) => Ok(Json(conversation)),
        None => Err(ApiError::NotFound(format!("session '{session_id}' not found"))),
    }
}

/// `DELETE /api/sessions/{id}`
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session_id = SessionId::from(id);
    if state.runtime.delete_session(&session_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        warn!("delete requested for unknown session {session_id}");
        Err(ApiError::NotFound(format!("session '{session_id}' not found")))
    }
}

/// `GET /api/sessions`
pub async fn list_sessions(
    State(state): State<SharedState>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    Ok(Json(state.runtime.list_sessions().await?))
}

/// `GET /api/tools`
pub async fn list_tools(State(state): State<SharedState>) -> Json<Vec<ToolDefinition>> {
    Json(state.runtime.tool_definitions())
}
