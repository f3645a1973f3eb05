use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::{EndReason, SessionPhase};

/// Publicly visible session phase exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleSessionPhase {
    /// Waiting for players.
    Waiting,
    /// Questions are being played.
    InProgress,
    /// All questions were played.
    Completed,
    /// Ended early after a delivery failure.
    Aborted,
}

impl From<SessionPhase> for VisibleSessionPhase {
    fn from(value: SessionPhase) -> Self {
        match value {
            SessionPhase::Waiting => VisibleSessionPhase::Waiting,
            SessionPhase::InProgress => VisibleSessionPhase::InProgress,
            SessionPhase::Ended(EndReason::Completed) => VisibleSessionPhase::Completed,
            SessionPhase::Ended(EndReason::Aborted) => VisibleSessionPhase::Aborted,
        }
    }
}
