//! Axum Handlers for the REST API
//!
//! Session start and end live here; the WebSocket attach handler lives in
//! `ws::relay`. The caller's identity arrives pre-authenticated in the
//! `x-user-id` header, supplied by the fronting auth layer.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;

use crate::{
    error::VoiceError,
    models::{ErrorResponse, StartSessionPayload, StartSessionResponse},
    session::{SessionConfig, SessionSnapshot},
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    InternalServerError(anyhow::Error),
}

impl ApiError {
    fn from_voice(err: VoiceError) -> Self {
        match err {
            VoiceError::UpstreamUnavailable(_) => ApiError::BadGateway(err.to_string()),
            VoiceError::SessionNotFound(_) => ApiError::NotFound(err.to_string()),
            VoiceError::DuplicateSession(_) | VoiceError::AlreadyAttached(_) => {
                ApiError::Conflict(err.to_string())
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(ErrorResponse { message })).into_response()
            }
            ApiError::BadGateway(message) => {
                (StatusCode::BAD_GATEWAY, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

fn require_user_id(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("x-user-id header is required".to_string()))
}

/// Start a new voice session.
#[utoipa::path(
    post,
    path = "/api/v1/voice/session",
    request_body = StartSessionPayload,
    responses(
        (status = 201, description = "Session started", body = StartSessionResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 502, description = "Upstream voice backend unavailable", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The authenticated caller's identity")
    )
)]
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<StartSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user_id(&headers)?;

    if !state.config.is_supported_language(&payload.language) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported language. Use: {}",
            state.config.supported_languages.join(",")
        )));
    }
    if !state.config.is_supported_model(&payload.model) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported model. Use: {}",
            state.config.supported_models.join(",")
        )));
    }

    let started = state
        .sessions
        .start_session(
            SessionConfig {
                language: payload.language,
                model: payload.model,
            },
            user_id,
        )
        .await
        .map_err(ApiError::from_voice)?;

    Ok((
        StatusCode::CREATED,
        Json(StartSessionResponse {
            session_id: started.session_id,
            ws_url: started.relay_path,
        }),
    ))
}

/// End a voice session. Idempotent: ending an unknown session succeeds.
#[utoipa::path(
    delete,
    path = "/api/v1/voice/session/{id}",
    responses(
        (status = 204, description = "Session ended (or was already gone)")
    ),
    params(
        ("id" = String, Path, description = "The session id")
    )
)]
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> StatusCode {
    state.sessions.end_session(&session_id).await;
    StatusCode::NO_CONTENT
}

/// List currently active sessions (diagnostics).
#[utoipa::path(
    get,
    path = "/api/v1/voice/sessions",
    responses(
        (status = 200, description = "Active sessions", body = [SessionSnapshot])
    )
)]
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionSnapshot>> {
    Json(state.sessions.store().list_active())
}
