use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sessions/{session_id}/events",
    tag = "sse",
    params(("session_id" = String, Path, description = "Session identifier")),
    responses(
        (status = 200, description = "Session SSE stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Session not found or already ended")
    )
)]
/// Stream the question, update and end events of one session.
pub async fn session_stream(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let receiver = sse_service::subscribe_session(&state, &session_id)?;
    info!(%session_id, "new session SSE connection");
    Ok(sse_service::to_sse_stream(receiver, session_id))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sessions/{session_id}/events", get(session_stream))
}
