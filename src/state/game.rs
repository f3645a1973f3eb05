use std::sync::Arc;

use crate::dao::models::QuestionEntity;

/// Identifier of a quiz session, also used as the broadcast channel name.
pub type SessionId = String;

/// Opaque identifier chosen by the client for a player.
pub type PlayerId = String;

/// Immutable, shared question sequence loaded once at startup.
pub type QuestionSet = Arc<[Question]>;

/// Multiple-choice question as served by the question bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Prompt shown to the players.
    pub prompt: String,
    /// Ordered answer options.
    pub options: Vec<String>,
    /// 0-based index of the correct option inside [`Question::options`].
    pub correct_index: usize,
}

impl Question {
    /// Whether `answer_index` designates the correct option. Out-of-range
    /// indices are simply wrong answers.
    pub fn is_correct(&self, answer_index: usize) -> bool {
        answer_index == self.correct_index
    }
}

/// Player tracked inside a single session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Client supplied identifier, unique within the session.
    pub id: PlayerId,
    /// Display name used on the scoreboard.
    pub name: String,
    /// Number of correct answers so far.
    pub score: u32,
    /// Whether the player already answered the question currently open.
    pub has_answered: bool,
}

impl Player {
    /// Fresh player with a zero score.
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            score: 0,
            has_answered: false,
        }
    }
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            prompt: value.question,
            options: value.possible_answers,
            correct_index: value.correct_answer,
        }
    }
}

impl From<Question> for QuestionEntity {
    fn from(value: Question) -> Self {
        Self {
            question: value.prompt,
            possible_answers: value.options,
            correct_answer: value.correct_index,
        }
    }
}
