use thiserror::Error;
use tokio::time::Instant;

use crate::state::poll::{EndReason, EndedPoll, Poll, PollId};

/// Lifecycle of the single live poll slot.
#[derive(Debug, Clone, Default)]
pub enum PollPhase {
    /// No poll is accepting responses.
    #[default]
    Idle,
    /// One poll is accepting responses until its deadline.
    Active(Poll),
}

/// Data-free view of [`PollPhase`], used in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Idle,
    Active,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// A new poll starts accepting responses.
    Start(Poll),
    /// The active poll stops, for the given reason, at the given instant.
    End {
        /// Why the poll ended.
        reason: EndReason,
        /// Monotonic instant at which the end was processed.
        at: Instant,
    },
}

impl PollEvent {
    fn name(&self) -> &'static str {
        match self {
            PollEvent::Start(_) => "start",
            PollEvent::End { .. } => "end",
        }
    }
}

/// Outcome of a successfully applied event.
#[derive(Debug, Clone)]
pub enum Transition {
    /// The poll with this identifier is now active.
    Started(PollId),
    /// The active poll ended and was removed from the live slot.
    Ended(EndedPoll),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: `{event}` cannot be applied while {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: PhaseKind,
    /// Name of the rejected event.
    pub event: &'static str,
}

/// State machine implementing the Idle → Active → Idle poll lifecycle.
#[derive(Debug, Default)]
pub struct PollStateMachine {
    phase: PollPhase,
}

impl PollStateMachine {
    /// Create a new state machine initialised in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase_kind(&self) -> PhaseKind {
        match self.phase {
            PollPhase::Idle => PhaseKind::Idle,
            PollPhase::Active(_) => PhaseKind::Active,
        }
    }

    pub fn active_poll(&self) -> Option<&Poll> {
        match &self.phase {
            PollPhase::Active(poll) => Some(poll),
            PollPhase::Idle => None,
        }
    }

    pub fn active_poll_mut(&mut self) -> Option<&mut Poll> {
        match &mut self.phase {
            PollPhase::Active(poll) => Some(poll),
            PollPhase::Idle => None,
        }
    }

    /// Apply `event`, moving the live slot to the next phase.
    ///
    /// Starting is only valid from idle; replacing a running poll requires ending it first.
    pub fn apply(&mut self, event: PollEvent) -> Result<Transition, InvalidTransition> {
        let transition = match (std::mem::take(&mut self.phase), event) {
            (PollPhase::Idle, PollEvent::Start(poll)) => {
                let id = poll.id();
                self.phase = PollPhase::Active(poll);
                Transition::Started(id)
            }
            (PollPhase::Active(poll), PollEvent::End { reason, at }) => {
                Transition::Ended(EndedPoll::new(poll, reason, at))
            }
            (phase, event) => {
                let from = match phase {
                    PollPhase::Idle => PhaseKind::Idle,
                    PollPhase::Active(_) => PhaseKind::Active,
                };
                self.phase = phase;
                return Err(InvalidTransition {
                    from,
                    event: event.name(),
                });
            }
        };

        Ok(transition)
    }

    /// End the active poll if there is one; a no-op returning `None` when idle.
    pub fn end(&mut self, reason: EndReason, at: Instant) -> Option<EndedPoll> {
        match self.apply(PollEvent::End { reason, at }) {
            Ok(Transition::Ended(ended)) => Some(ended),
            Ok(Transition::Started(_)) | Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::state::poll::tests::draft;

    fn poll() -> Poll {
        Poll::start(draft(60), Instant::now(), SystemTime::now())
    }

    #[test]
    fn initial_state_is_idle() {
        let sm = PollStateMachine::new();
        assert_eq!(sm.phase_kind(), PhaseKind::Idle);
        assert!(sm.active_poll().is_none());
    }

    #[tokio::test]
    async fn start_then_end_returns_to_idle() {
        let mut sm = PollStateMachine::new();
        let poll = poll();
        let id = poll.id();

        match sm.apply(PollEvent::Start(poll)).unwrap() {
            Transition::Started(started) => assert_eq!(started, id),
            other => panic!("unexpected transition: {other:?}"),
        }
        assert_eq!(sm.phase_kind(), PhaseKind::Active);
        assert_eq!(sm.active_poll().map(Poll::id), Some(id));

        let ended = sm.end(EndReason::Manual, Instant::now()).unwrap();
        assert_eq!(ended.poll.id(), id);
        assert_eq!(ended.reason, EndReason::Manual);
        assert_eq!(sm.phase_kind(), PhaseKind::Idle);
    }

    #[tokio::test]
    async fn starting_while_active_is_rejected() {
        let mut sm = PollStateMachine::new();
        let first = poll();
        let first_id = first.id();
        sm.apply(PollEvent::Start(first)).unwrap();

        let err = sm.apply(PollEvent::Start(poll())).unwrap_err();
        assert_eq!(err.from, PhaseKind::Active);
        assert_eq!(err.event, "start");
        assert_eq!(sm.active_poll().map(Poll::id), Some(first_id));
    }

    #[tokio::test]
    async fn second_end_is_a_no_op() {
        let mut sm = PollStateMachine::new();
        sm.apply(PollEvent::Start(poll())).unwrap();

        assert!(sm.end(EndReason::Timeout, Instant::now()).is_some());
        assert!(sm.end(EndReason::Manual, Instant::now()).is_none());
        assert_eq!(sm.phase_kind(), PhaseKind::Idle);
    }

    #[tokio::test]
    async fn invalid_transition_returns_error() {
        let mut sm = PollStateMachine::new();
        let err = sm
            .apply(PollEvent::End {
                reason: EndReason::Manual,
                at: Instant::now(),
            })
            .unwrap_err();
        assert_eq!(err.from, PhaseKind::Idle);
        assert_eq!(err.event, "end");
    }
}
