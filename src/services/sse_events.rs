use crate::{
    dto::sse::ServerEvent,
    state::broadcast::{QuizEvent, QuizUpdate},
};

/// A question opened for answers.
pub const EVENT_NEW_QUESTION: &str = "new_question";
/// Status notice or scoreboard.
pub const EVENT_QUIZ_UPDATE: &str = "quiz-update";
/// Completion notice.
pub const EVENT_QUIZ_END: &str = "quiz-end";

/// Encode a session event for the wire: named SSE event with a JSON data field.
pub fn to_server_event(event: &QuizEvent) -> serde_json::Result<ServerEvent> {
    match event {
        QuizEvent::NewQuestion(payload) => {
            ServerEvent::json(Some(EVENT_NEW_QUESTION.to_string()), payload)
        }
        QuizEvent::Update(QuizUpdate::Status(message)) => {
            ServerEvent::json(Some(EVENT_QUIZ_UPDATE.to_string()), message)
        }
        QuizEvent::Update(QuizUpdate::Scoreboard(scores)) => {
            ServerEvent::json(Some(EVENT_QUIZ_UPDATE.to_string()), scores)
        }
        QuizEvent::End(message) => ServerEvent::json(Some(EVENT_QUIZ_END.to_string()), message),
    }
}
