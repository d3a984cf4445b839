//! Pure ballot state machine - no I/O, no async.
//!
//! The runtime (`state.rs`) and the unit tests below both drive these exact
//! transitions, so the logic that safety depends on lives in one place.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A ballot number: a `(round, node)` pair compared lexicographically.
///
/// `node` is the proposing node's stable ordinal within the membership, which
/// keeps ballots from distinct proposers distinct even when they race on the
/// same round.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Ballot {
    /// Proposal round. Monotone per proposer.
    pub round: u64,
    /// Ordinal of the proposer that issued this ballot.
    pub node: u64,
}

impl Ballot {
    /// The ballot held before anything was promised or accepted.
    pub const ZERO: Ballot = Ballot { round: 0, node: 0 };

    #[must_use]
    pub fn new(round: u64, node: u64) -> Self {
        Ballot { round, node }
    }

    /// Whether this is the initial, never-assigned ballot.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self == Ballot::ZERO
    }
}

impl fmt::Display for Ballot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.round, self.node)
    }
}

/// The durable portion of a node's state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotState {
    /// Highest ballot whose value this node has accepted (acceptor/learner)
    /// or driven to completion (proposer).
    pub accepted: Ballot,
    /// Highest ballot this node has promised not to accept below. On a
    /// proposer it records the most recent ballot attempted.
    pub promised: Ballot,
    /// Value associated with `accepted`. Empty iff `accepted` is zero.
    pub value: String,
}

/// Outcome of a prepare transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// The promise was made; `promised` now equals the prepared ballot.
    Promised,
    /// A ballot at least as high was already promised; no state change.
    Superseded,
}

/// Outcome of an accept transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// The value was installed and must be persisted.
    Accepted,
    /// The ballot did not match the standing promise; no state change.
    Rejected,
}

impl BallotState {
    /// Phase 1 at an acceptor. Promises `ballot` if it is strictly higher
    /// than any standing promise; otherwise leaves state untouched so the
    /// reply's higher `promised` signals rejection to the proposer.
    pub fn prepare(&mut self, ballot: Ballot) -> PrepareOutcome {
        if ballot > self.promised {
            self.promised = ballot;
            PrepareOutcome::Promised
        } else {
            PrepareOutcome::Superseded
        }
    }

    /// Phase 2 at an acceptor. Only the exact ballot most recently promised
    /// may be accepted: anything lower breaks the promise, and anything
    /// higher may have been outpromised in the interim.
    pub fn accept(&mut self, ballot: Ballot, value: &str) -> AcceptOutcome {
        if ballot == self.promised {
            self.accepted = ballot;
            self.value = value.to_owned();
            AcceptOutcome::Accepted
        } else {
            AcceptOutcome::Rejected
        }
    }

    /// Phase 2 at a learner. Learners never see prepares, so they install
    /// any accept that is not below what previous accepts taught them.
    pub fn observe(&mut self, ballot: Ballot, value: &str) -> AcceptOutcome {
        if ballot >= self.promised {
            self.promised = ballot;
            self.accepted = ballot;
            self.value = value.to_owned();
            AcceptOutcome::Accepted
        } else {
            AcceptOutcome::Rejected
        }
    }

    /// Record the ballot a proposer is about to drive. In-memory bookkeeping
    /// only; it reaches disk with the next commit.
    pub fn begin(&mut self, ballot: Ballot) {
        if ballot > self.promised {
            self.promised = ballot;
        }
    }

    /// Local commit on a proposer, both for completed proposals and for
    /// catch-up when a higher ballot was observed during prepare.
    pub fn commit(&mut self, ballot: Ballot, value: &str) {
        self.accepted = ballot;
        if self.promised < ballot {
            self.promised = ballot;
        }
        self.value = value.to_owned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ballots_order_lexicographically() {
        assert!(Ballot::new(2, 0) > Ballot::new(1, 9));
        assert!(Ballot::new(1, 1) > Ballot::new(1, 0));
        assert!(Ballot::new(1, 0) > Ballot::ZERO);
        assert_eq!(Ballot::new(3, 2), Ballot::new(3, 2));
    }

    #[test]
    fn prepare_higher_promises() {
        let mut state = BallotState::default();
        assert_eq!(state.prepare(Ballot::new(1, 0)), PrepareOutcome::Promised);
        assert_eq!(state.promised, Ballot::new(1, 0));
        assert_eq!(state.accepted, Ballot::ZERO);
    }

    #[test]
    fn prepare_lower_or_equal_superseded() {
        let mut state = BallotState::default();
        state.prepare(Ballot::new(5, 1));
        assert_eq!(state.prepare(Ballot::new(5, 1)), PrepareOutcome::Superseded);
        assert_eq!(state.prepare(Ballot::new(4, 9)), PrepareOutcome::Superseded);
        // state untouched by the rejected prepares
        assert_eq!(state.promised, Ballot::new(5, 1));
    }

    #[test]
    fn accept_requires_exact_promise() {
        let mut state = BallotState::default();
        state.prepare(Ballot::new(3, 0));

        assert_eq!(state.accept(Ballot::new(2, 0), "old"), AcceptOutcome::Rejected);
        assert_eq!(state.accept(Ballot::new(4, 0), "new"), AcceptOutcome::Rejected);
        assert_eq!(state.value, "");

        assert_eq!(state.accept(Ballot::new(3, 0), "v"), AcceptOutcome::Accepted);
        assert_eq!(state.accepted, Ballot::new(3, 0));
        assert_eq!(state.value, "v");
    }

    #[test]
    fn accept_after_newer_promise_rejected() {
        let mut state = BallotState::default();
        state.prepare(Ballot::new(1, 0));
        state.prepare(Ballot::new(2, 1));
        // The promise to (2,1) forbids committing the older prepare.
        assert_eq!(state.accept(Ballot::new(1, 0), "stale"), AcceptOutcome::Rejected);
        assert_eq!(state.accepted, Ballot::ZERO);
    }

    #[test]
    fn observe_installs_without_prepare() {
        let mut state = BallotState::default();
        assert_eq!(state.observe(Ballot::new(7, 1), "chosen"), AcceptOutcome::Accepted);
        assert_eq!(state.accepted, Ballot::new(7, 1));
        assert_eq!(state.promised, Ballot::new(7, 1));

        assert_eq!(state.observe(Ballot::new(6, 0), "older"), AcceptOutcome::Rejected);
        assert_eq!(state.value, "chosen");
    }

    #[test]
    fn promised_never_below_accepted() {
        let mut state = BallotState::default();
        state.prepare(Ballot::new(1, 0));
        state.accept(Ballot::new(1, 0), "a");
        state.commit(Ballot::new(8, 2), "b");
        assert!(state.promised >= state.accepted);
        state.observe(Ballot::new(9, 0), "c");
        assert!(state.promised >= state.accepted);
    }
}
