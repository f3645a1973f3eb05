//! Abstractions over the per-session event fan-out.

use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use thiserror::Error;

use crate::{
    dto::sse::QuestionPayload,
    state::game::{Question, SessionId},
};

/// Player display name to score. Duplicate names keep the last written score.
pub type Scoreboard = IndexMap<String, u32>;

/// Events a session publishes on its channel.
#[derive(Debug, Clone, PartialEq)]
pub enum QuizEvent {
    /// A new question is open for answers.
    NewQuestion(QuestionPayload),
    /// Free-text status or scoreboard update.
    Update(QuizUpdate),
    /// Completion notice; no further events follow.
    End(String),
}

/// Payload of a `quiz-update` event.
#[derive(Debug, Clone, PartialEq)]
pub enum QuizUpdate {
    /// Human-readable notice such as "starting soon".
    Status(String),
    /// Final scores.
    Scoreboard(Scoreboard),
}

impl QuizEvent {
    /// Build a `new_question` event, leaving the correct answer out.
    pub fn question(question: &Question) -> Self {
        QuizEvent::NewQuestion(QuestionPayload {
            question: question.prompt.clone(),
            possible_answers: question.options.clone(),
        })
    }

    /// Build a free-text `quiz-update` event.
    pub fn status(message: impl Into<String>) -> Self {
        QuizEvent::Update(QuizUpdate::Status(message.into()))
    }

    /// Build a scoreboard `quiz-update` event.
    pub fn scoreboard(scores: Scoreboard) -> Self {
        QuizEvent::Update(QuizUpdate::Scoreboard(scores))
    }
}

/// Error raised when an event cannot be delivered to the session channel.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The channel was closed, usually because the session was torn down.
    #[error("broadcast channel for session `{session_id}` is closed")]
    ChannelClosed {
        /// Session whose channel is gone.
        session_id: SessionId,
    },
    /// The event payload could not be encoded.
    #[error("failed to serialize event payload")]
    Serialize(#[from] serde_json::Error),
}

/// Publishing side of one session's broadcast channel.
pub trait SessionChannel: Send + Sync {
    /// Deliver `event` to every subscriber of the session.
    fn publish(&self, event: QuizEvent) -> BoxFuture<'static, Result<(), PublishError>>;
}

/// Factory for per-session channels, keyed by session id.
pub trait BroadcastTransport: Send + Sync {
    /// Open the channel for `session_id`, creating it when needed.
    fn open(&self, session_id: &str) -> Arc<dyn SessionChannel>;
    /// Release the channel; subscribers see the stream end.
    fn close(&self, session_id: &str);
}
