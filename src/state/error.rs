use thiserror::Error;

use crate::state::{
    broadcast::PublishError,
    game::{PlayerId, SessionId},
    state_machine::InvalidTransition,
};

/// Failures surfaced by the session registry and individual sessions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The registry already runs the maximum number of sessions.
    #[error("max sessions reached, could not create a session to join")]
    CapacityExceeded,
    /// The session roster is complete.
    #[error("session is full")]
    SessionFull,
    /// The id does not match a session in the expected partition.
    #[error("session `{0}` not found")]
    SessionNotFound(SessionId),
    /// The player is not part of the session.
    #[error("player `{0}` not found in session")]
    PlayerNotFound(PlayerId),
    /// The player id is already seated in this session.
    #[error("player `{0}` already joined this session")]
    AlreadyJoined(PlayerId),
    /// The player already answered the open question.
    #[error("player `{0}` has already answered the current question")]
    AlreadyAnswered(PlayerId),
    /// No question is open for answers right now.
    #[error("no question is currently open for answers")]
    VotingClosed,
    /// The session state machine refused the transition.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// The broadcast channel rejected an event.
    #[error("failed to publish session event")]
    Publish(#[from] PublishError),
    /// The registry task is gone or dropped the reply.
    #[error("session registry is unavailable")]
    RegistryUnavailable,
}
