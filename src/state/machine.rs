use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::TournamentStatus;

/// Why a tournament left the in-progress status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The final match produced a champion.
    ChampionDecided,
    /// An administrator ended the tournament early.
    AdminEnded,
}

/// Events that can be applied to the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TournamentEvent {
    /// The lobby filled up; generate the bracket and begin play.
    Start,
    /// Leave the in-progress status, either naturally or by admin action.
    Finish(FinishReason),
    /// Discard bracket progress and return to an open lobby.
    Reset,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The status the state machine was in when the invalid event was received.
    pub from: TournamentStatus,
    /// The event that cannot be applied from this status.
    pub event: TournamentEvent,
}

/// Errors that can occur when planning a lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current status.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// Status changed since the plan was created.
    StatusMismatch {
        /// Status when plan was created.
        expected: TournamentStatus,
        /// Current status.
        actual: TournamentStatus,
    },
    /// Version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: usize,
        /// Current version.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned lifecycle transition.
pub type PlanId = Uuid;

/// A lifecycle transition that has been validated but not yet applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Status the state machine is currently in.
    pub from: TournamentStatus,
    /// Status the state machine will transition to.
    pub to: TournamentStatus,
    /// Event that triggered this transition.
    pub event: TournamentEvent,
    /// Version number after applying this transition.
    pub version_next: usize,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Lifecycle state machine for the single active tournament.
///
/// Transitions are planned first and applied only after their side effects
/// (bracket writes, status persistence) succeeded, so a failed start or reset
/// leaves the in-memory status untouched.
#[derive(Debug, Clone)]
pub struct TournamentMachine {
    status: TournamentStatus,
    version: usize,
    pending: Option<Plan>,
}

impl Default for TournamentMachine {
    fn default() -> Self {
        Self {
            status: TournamentStatus::Lobby,
            version: 0,
            pending: None,
        }
    }
}

impl TournamentMachine {
    /// Create a new state machine initialised in the lobby status.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current status.
    pub fn status(&self) -> TournamentStatus {
        self.status
    }

    /// Force the machine to a given status without planning.
    ///
    /// Used once at boot to resume the status of a tournament found in
    /// storage.
    pub fn resume(&mut self, status: TournamentStatus) {
        self.status = status;
        self.pending = None;
    }

    /// Plan a transition by validating that the event can be applied from the
    /// current status. Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: TournamentEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.status,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next status.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<TournamentStatus, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.status != plan.from {
            return Err(ApplyError::StatusMismatch {
                expected: plan.from,
                actual: self.status,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.status = plan.to;
        self.version = plan.version_next;
        self.pending = None;

        Ok(self.status)
    }

    /// Abort a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    fn compute_transition(
        &self,
        event: TournamentEvent,
    ) -> Result<TournamentStatus, InvalidTransition> {
        let next = match (self.status, event) {
            (TournamentStatus::Lobby, TournamentEvent::Start) => TournamentStatus::InProgress,
            (TournamentStatus::InProgress, TournamentEvent::Finish(..)) => {
                TournamentStatus::Finished
            }
            (TournamentStatus::InProgress, TournamentEvent::Reset)
            | (TournamentStatus::Finished, TournamentEvent::Reset) => TournamentStatus::Lobby,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut TournamentMachine, event: TournamentEvent) -> TournamentStatus {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_status_is_lobby() {
        let sm = TournamentMachine::new();
        assert_eq!(sm.status(), TournamentStatus::Lobby);
    }

    #[test]
    fn full_happy_path_through_tournament() {
        let mut sm = TournamentMachine::new();

        assert_eq!(
            apply(&mut sm, TournamentEvent::Start),
            TournamentStatus::InProgress
        );
        assert_eq!(
            apply(
                &mut sm,
                TournamentEvent::Finish(FinishReason::ChampionDecided)
            ),
            TournamentStatus::Finished
        );
        assert_eq!(
            apply(&mut sm, TournamentEvent::Reset),
            TournamentStatus::Lobby
        );
    }

    #[test]
    fn admin_can_end_and_reset_mid_bracket() {
        let mut sm = TournamentMachine::new();
        apply(&mut sm, TournamentEvent::Start);

        assert_eq!(
            apply(&mut sm, TournamentEvent::Finish(FinishReason::AdminEnded)),
            TournamentStatus::Finished
        );
    }

    #[test]
    fn reset_is_valid_while_in_progress() {
        let mut sm = TournamentMachine::new();
        apply(&mut sm, TournamentEvent::Start);
        assert_eq!(
            apply(&mut sm, TournamentEvent::Reset),
            TournamentStatus::Lobby
        );
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut sm = TournamentMachine::new();
        let err = sm
            .plan(TournamentEvent::Finish(FinishReason::ChampionDecided))
            .unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, TournamentStatus::Lobby);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn second_plan_while_pending_is_rejected() {
        let mut sm = TournamentMachine::new();
        let _plan = sm.plan(TournamentEvent::Start).unwrap();
        assert_eq!(
            sm.plan(TournamentEvent::Start).unwrap_err(),
            PlanError::AlreadyPending
        );
    }

    #[test]
    fn abort_clears_pending() {
        let mut sm = TournamentMachine::new();
        let plan = sm.plan(TournamentEvent::Start).unwrap();
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.status(), TournamentStatus::Lobby);
    }

    #[test]
    fn apply_with_wrong_plan_id_keeps_pending() {
        let mut sm = TournamentMachine::new();
        let plan = sm.plan(TournamentEvent::Start).unwrap();
        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { .. }));
        assert_eq!(sm.apply(plan.id).unwrap(), TournamentStatus::InProgress);
    }
}
