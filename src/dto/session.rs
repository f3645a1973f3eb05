//! Request and response bodies of the session routes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{phase::VisibleSessionPhase, validation::validate_not_blank},
    state::{game::Player, session::SessionSnapshot},
};

/// Payload used to join the next available session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionRequest {
    /// Name shown on the scoreboard.
    #[validate(custom(function = "validate_not_blank"))]
    pub player_name: String,
    /// Client chosen identifier, unique within a session.
    #[validate(custom(function = "validate_not_blank"))]
    pub player_id: String,
}

/// Session the player was seated in.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinSessionResponse {
    /// Session to subscribe to and answer in.
    pub session_id: String,
}

/// Answer to the question currently open in a session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    /// Session returned by `/connect-to-session`.
    #[validate(custom(function = "validate_not_blank"))]
    pub session_id: String,
    /// Answering player.
    #[validate(custom(function = "validate_not_blank"))]
    pub player_id: String,
    /// 1-based index of the chosen answer.
    #[validate(range(min = 1))]
    pub answer: i64,
}

/// Acknowledgement of a recorded answer.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitAnswerResponse {
    /// Confirmation text.
    pub message: String,
}

/// Player entry of a [`SessionSummary`].
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    /// Player identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Correct answers so far.
    pub score: u32,
}

impl From<Player> for PlayerSummary {
    fn from(player: Player) -> Self {
        Self {
            id: player.id,
            name: player.name,
            score: player.score,
        }
    }
}

/// Read-only projection of a session.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Session identifier.
    pub id: String,
    /// Lifecycle phase.
    pub phase: VisibleSessionPhase,
    /// Players in join order.
    pub players: Vec<PlayerSummary>,
    /// Roster size that starts the game.
    pub max_players: usize,
    /// 0-based cursor into the question sequence.
    pub current_question: usize,
    /// Length of the question sequence.
    pub question_count: usize,
}

impl From<SessionSnapshot> for SessionSummary {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            id: snapshot.id,
            phase: snapshot.phase.into(),
            players: snapshot.players.into_iter().map(Into::into).collect(),
            max_players: snapshot.max_players,
            current_question: snapshot.current_question,
            question_count: snapshot.question_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_request_uses_camel_case_and_rejects_blank_fields() {
        let request: JoinSessionRequest =
            serde_json::from_str(r#"{"playerName": "Alice", "playerId": "a1"}"#).unwrap();
        assert!(request.validate().is_ok());

        let blank: JoinSessionRequest =
            serde_json::from_str(r#"{"playerName": " ", "playerId": "a1"}"#).unwrap();
        let errors = blank.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("player_name"));
    }

    #[test]
    fn submit_request_requires_one_based_answer() {
        let request: SubmitAnswerRequest = serde_json::from_str(
            r#"{"sessionId": "s1", "playerId": "a1", "answer": 0}"#,
        )
        .unwrap();
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("answer"));
    }
}
