use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::session::{
        JoinSessionRequest, JoinSessionResponse, SessionSummary, SubmitAnswerRequest,
        SubmitAnswerResponse,
    },
    error::AppError,
    routes::json::AppJson,
    services::session_service,
    state::SharedState,
};

/// Matchmaking and gameplay endpoints used by players.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/connect-to-session", post(connect_to_session))
        .route("/submit-answer", post(submit_answer))
        .route("/sessions/{session_id}", get(get_session))
}

#[utoipa::path(
    post,
    path = "/connect-to-session",
    tag = "sessions",
    request_body = JoinSessionRequest,
    responses(
        (status = 200, description = "Player seated in a session", body = JoinSessionResponse),
        (status = 400, description = "Malformed or invalid payload"),
        (status = 409, description = "Player already joined"),
        (status = 503, description = "Session limit reached")
    )
)]
/// Seat the player in the oldest session with room, creating one if needed.
pub async fn connect_to_session(
    State(state): State<SharedState>,
    AppJson(payload): AppJson<JoinSessionRequest>,
) -> Result<Json<JoinSessionResponse>, AppError> {
    payload.validate()?;
    let response = session_service::join_session(&state, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/submit-answer",
    tag = "sessions",
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = SubmitAnswerResponse),
        (status = 400, description = "Malformed or invalid payload"),
        (status = 404, description = "Session or player not found"),
        (status = 409, description = "Already answered or voting closed")
    )
)]
/// Record the player's answer to the question currently open.
pub async fn submit_answer(
    State(state): State<SharedState>,
    AppJson(payload): AppJson<SubmitAnswerRequest>,
) -> Result<Json<SubmitAnswerResponse>, AppError> {
    payload.validate()?;
    let response = session_service::submit_answer(&state, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/sessions/{session_id}",
    tag = "sessions",
    params(("session_id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session summary", body = SessionSummary),
        (status = 404, description = "Session not found")
    )
)]
/// Describe a waiting or in-progress session.
pub async fn get_session(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = session_service::describe_session(&state, &session_id).await?;
    Ok(Json(summary))
}
