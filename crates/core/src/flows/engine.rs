use thiserror::Error;

use crate::domain::approval::Decision;
use crate::domain::quote::QuoteStatus;
use crate::flows::states::{StatusGuard, StatusPolicy, TimestampField, Transition};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("transition from {from} to {to} is not allowed")]
    IllegalTransition { from: QuoteStatus, to: QuoteStatus },
}

/// Pure transition rules for quote status. Persistence applies the returned
/// [`Transition`] under the matching [`StatusGuard`].
#[derive(Clone, Copy, Debug, Default)]
pub struct QuoteStateMachine {
    policy: StatusPolicy,
}

impl QuoteStateMachine {
    pub fn new(policy: StatusPolicy) -> Self {
        Self { policy }
    }

    pub fn initial_state(&self) -> QuoteStatus {
        QuoteStatus::Draft
    }

    /// Internal approver decision. A quote is decided at most once.
    pub fn decide(
        &self,
        current: QuoteStatus,
        decision: Decision,
    ) -> Result<Transition, FlowTransitionError> {
        if current.is_decided() {
            return Ok(Transition::Settled(current));
        }
        self.apply(current, decision.target_status(), Some(TimestampField::DecidedAt))
    }

    /// Customer sign-off. Accepting twice replays the first acceptance.
    pub fn accept(&self, current: QuoteStatus) -> Result<Transition, FlowTransitionError> {
        if current == QuoteStatus::CustomerApproved {
            return Ok(Transition::Settled(current));
        }
        self.apply(current, QuoteStatus::CustomerApproved, Some(TimestampField::CustomerApprovedAt))
    }

    /// Generic status update. Under the permissive policy even a same-status
    /// update is recorded.
    pub fn update_status(
        &self,
        current: QuoteStatus,
        target: QuoteStatus,
    ) -> Result<Transition, FlowTransitionError> {
        let stamp = (target == QuoteStatus::Sent).then_some(TimestampField::SentAt);
        self.apply(current, target, stamp)
    }

    /// Store-side precondition for a decision write.
    pub fn decision_guard(&self, decision: Decision) -> StatusGuard {
        match self.policy.predecessors(decision.target_status()) {
            Some(allowed) => StatusGuard::AnyOf(allowed.to_vec()),
            None => StatusGuard::NoneOf(vec![QuoteStatus::Approved, QuoteStatus::Rejected]),
        }
    }

    /// Store-side precondition for an acceptance write.
    pub fn acceptance_guard(&self) -> StatusGuard {
        match self.policy.predecessors(QuoteStatus::CustomerApproved) {
            Some(allowed) => StatusGuard::AnyOf(allowed.to_vec()),
            None => StatusGuard::NoneOf(vec![QuoteStatus::CustomerApproved]),
        }
    }

    fn apply(
        &self,
        from: QuoteStatus,
        to: QuoteStatus,
        stamp: Option<TimestampField>,
    ) -> Result<Transition, FlowTransitionError> {
        if !self.policy.allows(from, to) {
            return Err(FlowTransitionError::IllegalTransition { from, to });
        }
        Ok(Transition::Apply { from, to, stamp })
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::approval::Decision;
    use crate::domain::quote::QuoteStatus;
    use crate::flows::engine::{FlowTransitionError, QuoteStateMachine};
    use crate::flows::states::{StatusGuard, StatusPolicy, TimestampField, Transition};

    #[test]
    fn first_decision_applies_and_stamps_decided_at() {
        let machine = QuoteStateMachine::default();
        let transition =
            machine.decide(QuoteStatus::Draft, Decision::Approved).expect("decision applies");

        assert_eq!(
            transition,
            Transition::Apply {
                from: QuoteStatus::Draft,
                to: QuoteStatus::Approved,
                stamp: Some(TimestampField::DecidedAt),
            }
        );
    }

    #[test]
    fn second_decision_replays_existing_status() {
        let machine = QuoteStateMachine::default();

        for decided in [QuoteStatus::Approved, QuoteStatus::Rejected] {
            for decision in [Decision::Approved, Decision::Rejected] {
                let transition = machine.decide(decided, decision).expect("replay");
                assert_eq!(transition, Transition::Settled(decided));
            }
        }
    }

    #[test]
    fn permissive_policy_lets_sent_quote_be_decided() {
        let machine = QuoteStateMachine::default();
        let transition = machine.decide(QuoteStatus::Sent, Decision::Rejected).expect("applies");
        assert!(matches!(transition, Transition::Apply { to: QuoteStatus::Rejected, .. }));
    }

    #[test]
    fn acceptance_is_idempotent() {
        let machine = QuoteStateMachine::default();

        let first = machine.accept(QuoteStatus::Sent).expect("accept");
        assert_eq!(
            first,
            Transition::Apply {
                from: QuoteStatus::Sent,
                to: QuoteStatus::CustomerApproved,
                stamp: Some(TimestampField::CustomerApprovedAt),
            }
        );

        let replay = machine.accept(QuoteStatus::CustomerApproved).expect("replay");
        assert_eq!(replay, Transition::Settled(QuoteStatus::CustomerApproved));
    }

    #[test]
    fn only_sent_target_stamps_sent_at() {
        let machine = QuoteStateMachine::default();

        for target in QuoteStatus::ALL {
            let transition = machine.update_status(QuoteStatus::Approved, target).expect("apply");
            let Transition::Apply { stamp, .. } = transition else {
                panic!("permissive update always applies");
            };
            let expected = (target == QuoteStatus::Sent).then_some(TimestampField::SentAt);
            assert_eq!(stamp, expected);
        }
    }

    #[test]
    fn permissive_policy_accepts_any_pair() {
        let machine = QuoteStateMachine::new(StatusPolicy::Permissive);
        for from in QuoteStatus::ALL {
            for to in QuoteStatus::ALL {
                assert!(machine.update_status(from, to).is_ok());
            }
        }
    }

    #[test]
    fn strict_policy_follows_predecessor_table() {
        let machine = QuoteStateMachine::new(StatusPolicy::Strict);

        assert!(machine.update_status(QuoteStatus::Draft, QuoteStatus::PendingApproval).is_ok());
        assert!(machine.update_status(QuoteStatus::Approved, QuoteStatus::Sent).is_ok());
        assert!(machine.update_status(QuoteStatus::Rejected, QuoteStatus::Draft).is_ok());
        assert!(machine.update_status(QuoteStatus::Sent, QuoteStatus::Cancelled).is_ok());

        assert_eq!(
            machine.update_status(QuoteStatus::Draft, QuoteStatus::Sent),
            Err(FlowTransitionError::IllegalTransition {
                from: QuoteStatus::Draft,
                to: QuoteStatus::Sent,
            })
        );
        assert!(machine.update_status(QuoteStatus::CustomerApproved, QuoteStatus::Cancelled).is_err());
        assert!(machine.update_status(QuoteStatus::Cancelled, QuoteStatus::Draft).is_err());
    }

    #[test]
    fn strict_policy_refuses_self_transitions() {
        let machine = QuoteStateMachine::new(StatusPolicy::Strict);
        for status in QuoteStatus::ALL {
            assert!(machine.update_status(status, status).is_err());
        }
    }

    #[test]
    fn strict_policy_still_replays_settled_decisions() {
        let machine = QuoteStateMachine::new(StatusPolicy::Strict);

        assert_eq!(
            machine.decide(QuoteStatus::Approved, Decision::Rejected),
            Ok(Transition::Settled(QuoteStatus::Approved))
        );
        assert!(machine.decide(QuoteStatus::Sent, Decision::Approved).is_err());
        assert!(machine.accept(QuoteStatus::Draft).is_err());
    }

    #[test]
    fn guards_admit_only_undecided_states() {
        let machine = QuoteStateMachine::default();
        let decision = machine.decision_guard(Decision::Approved);
        assert!(decision.admits(QuoteStatus::PendingApproval));
        assert!(decision.admits(QuoteStatus::Sent));
        assert!(!decision.admits(QuoteStatus::Rejected));

        let acceptance = machine.acceptance_guard();
        assert!(acceptance.admits(QuoteStatus::Sent));
        assert!(!acceptance.admits(QuoteStatus::CustomerApproved));

        assert!(StatusGuard::Exactly(QuoteStatus::Draft).admits(QuoteStatus::Draft));
        assert!(!StatusGuard::Exactly(QuoteStatus::Draft).admits(QuoteStatus::Sent));
    }

    #[test]
    fn strict_guards_narrow_to_predecessors() {
        let machine = QuoteStateMachine::new(StatusPolicy::Strict);

        let decision = machine.decision_guard(Decision::Rejected);
        assert_eq!(
            decision,
            StatusGuard::AnyOf(vec![QuoteStatus::Draft, QuoteStatus::PendingApproval])
        );
        assert!(!decision.admits(QuoteStatus::Sent));

        let acceptance = machine.acceptance_guard();
        assert!(acceptance.admits(QuoteStatus::Approved));
        assert!(!acceptance.admits(QuoteStatus::Draft));
    }
}
