use thiserror::Error;

/// Lifecycle phases a quiz session goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Accepting players until the roster is full.
    Waiting,
    /// Roster is full; the progression loop owns the session.
    InProgress,
    /// Terminal phase.
    Ended(EndReason),
}

/// Indicates how a session reached its terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Every question was played and the scoreboard published.
    Completed,
    /// A publish failed or the registry refused the partition move.
    Aborted,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The last free seat was taken.
    Filled,
    /// The progression loop stopped.
    Finished(EndReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// Forward-only state machine driving a single session.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Waiting,
        }
    }
}

impl SessionStateMachine {
    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Apply `event`, returning the new phase.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        Ok(next)
    }

    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (SessionPhase::Waiting, SessionEvent::Filled) => SessionPhase::InProgress,
            (SessionPhase::InProgress, SessionEvent::Finished(reason)) => {
                SessionPhase::Ended(reason)
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
