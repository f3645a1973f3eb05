//! Service helpers translating HTTP payloads into registry commands.

use tracing::info;

use crate::{
    dto::session::{
        JoinSessionRequest, JoinSessionResponse, SessionSummary, SubmitAnswerRequest,
        SubmitAnswerResponse,
    },
    error::ServiceError,
    state::SharedState,
};

/// Seat the player in the next session with room.
pub async fn join_session(
    state: &SharedState,
    request: JoinSessionRequest,
) -> Result<JoinSessionResponse, ServiceError> {
    let JoinSessionRequest {
        player_name,
        player_id,
    } = request;

    let session_id = state
        .registry()
        .join_session(player_name.trim(), player_id.trim())
        .await?;
    info!(%session_id, player_id = %player_id.trim(), "player joined session");

    Ok(JoinSessionResponse { session_id })
}

/// Record an answer. The request carries a 1-based answer that is converted
/// to the 0-based index the sessions work with.
pub async fn submit_answer(
    state: &SharedState,
    request: SubmitAnswerRequest,
) -> Result<SubmitAnswerResponse, ServiceError> {
    let answer_index = to_answer_index(request.answer)?;

    state
        .registry()
        .submit_answer(
            request.session_id.trim(),
            request.player_id.trim(),
            answer_index,
        )
        .await?;

    Ok(SubmitAnswerResponse {
        message: "Answer submitted successfully.".into(),
    })
}

/// Return the read-only projection of a session.
pub async fn describe_session(
    state: &SharedState,
    session_id: &str,
) -> Result<SessionSummary, ServiceError> {
    let snapshot = state.registry().describe_session(session_id).await?;
    Ok(snapshot.into())
}

fn to_answer_index(answer: i64) -> Result<usize, ServiceError> {
    answer
        .checked_sub(1)
        .and_then(|index| usize::try_from(index).ok())
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!("answer must be 1 or greater (got {answer})"))
        })
}
