use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Lifecycle status of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Both players are paired but round 1 has not started.
    Waiting,
    /// Rounds are being played.
    InProgress,
    /// Every round was decided and the winner resolved.
    Completed,
    /// The match was abandoned before completion.
    Cancelled,
}

impl MatchStatus {
    /// Whether no further transition can leave this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }
}

/// Events that can be applied to a match lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    /// Begin round 1.
    Start,
    /// The final round was decided.
    Complete,
    /// A player left for good or the match could not proceed.
    Cancel,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The status the match was in when the invalid event was received.
    pub from: MatchStatus,
    /// The event that cannot be applied from this status.
    pub event: MatchEvent,
}

/// Monotonic `waiting -> in_progress -> completed | cancelled` lifecycle.
#[derive(Debug, Clone)]
pub struct MatchStateMachine {
    status: MatchStatus,
    version: usize,
}

impl Default for MatchStateMachine {
    fn default() -> Self {
        Self {
            status: MatchStatus::Waiting,
            version: 0,
        }
    }
}

impl MatchStateMachine {
    /// Create a new state machine initialised in the waiting state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current status.
    pub fn status(&self) -> MatchStatus {
        self.status
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Apply an event, moving to the next status when the transition is valid.
    ///
    /// An invalid event leaves the machine untouched.
    pub fn apply(&mut self, event: MatchEvent) -> Result<MatchStatus, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.status = next;
        self.version += 1;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: MatchEvent) -> Result<MatchStatus, InvalidTransition> {
        let next = match (self.status, event) {
            (MatchStatus::Waiting, MatchEvent::Start) => MatchStatus::InProgress,
            (MatchStatus::InProgress, MatchEvent::Complete) => MatchStatus::Completed,
            (MatchStatus::Waiting | MatchStatus::InProgress, MatchEvent::Cancel) => {
                MatchStatus::Cancelled
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_waiting() {
        let sm = MatchStateMachine::new();
        assert_eq!(sm.status(), MatchStatus::Waiting);
        assert_eq!(sm.version(), 0);
    }

    #[test]
    fn full_happy_path_through_match() {
        let mut sm = MatchStateMachine::new();
        assert_eq!(sm.apply(MatchEvent::Start), Ok(MatchStatus::InProgress));
        assert_eq!(sm.apply(MatchEvent::Complete), Ok(MatchStatus::Completed));
        assert!(sm.status().is_terminal());
        assert_eq!(sm.version(), 2);
    }

    #[test]
    fn starting_twice_is_rejected_without_side_effects() {
        let mut sm = MatchStateMachine::new();
        sm.apply(MatchEvent::Start).unwrap();

        let err = sm.apply(MatchEvent::Start).unwrap_err();
        assert_eq!(err.from, MatchStatus::InProgress);
        assert_eq!(err.event, MatchEvent::Start);
        assert_eq!(sm.status(), MatchStatus::InProgress);
        assert_eq!(sm.version(), 1);
    }

    #[test]
    fn cannot_complete_before_start() {
        let mut sm = MatchStateMachine::new();
        assert!(sm.apply(MatchEvent::Complete).is_err());
        assert_eq!(sm.status(), MatchStatus::Waiting);
    }

    #[test]
    fn cancel_is_allowed_until_terminal() {
        let mut waiting = MatchStateMachine::new();
        assert_eq!(waiting.apply(MatchEvent::Cancel), Ok(MatchStatus::Cancelled));

        let mut running = MatchStateMachine::new();
        running.apply(MatchEvent::Start).unwrap();
        assert_eq!(running.apply(MatchEvent::Cancel), Ok(MatchStatus::Cancelled));

        let mut done = MatchStateMachine::new();
        done.apply(MatchEvent::Start).unwrap();
        done.apply(MatchEvent::Complete).unwrap();
        assert!(done.apply(MatchEvent::Cancel).is_err());
        assert_eq!(done.status(), MatchStatus::Completed);
    }

    #[test]
    fn terminal_states_never_move_back() {
        let mut sm = MatchStateMachine::new();
        sm.apply(MatchEvent::Cancel).unwrap();
        for event in [MatchEvent::Start, MatchEvent::Complete, MatchEvent::Cancel] {
            assert!(sm.apply(event).is_err());
            assert_eq!(sm.status(), MatchStatus::Cancelled);
        }
    }
}
