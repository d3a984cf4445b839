//! Error types for the agreement service.

use std::io;

use thiserror::Error;

use crate::ballot::Ballot;
use crate::role::Role;

/// Main error type for node operations.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("wrong role [{role}] for operation [{op}]")]
    WrongRole { role: Role, op: &'static str },

    #[error("cannot achieve quorum with [{count}] acceptors")]
    EvenAcceptors { count: usize },

    #[error("address [{addr}] missing from membership")]
    UnknownSelf { addr: String },

    #[error("proposal not chosen after [{tries}] attempts")]
    RetryExhausted { tries: u32 },

    #[error("state persistence failed")]
    Persist(#[from] io::Error),

    #[error("failed to bind [{addr}]")]
    Bind { addr: String, source: io::Error },

    #[error("node state task is gone")]
    StateClosed,

    #[error("no consensus on [{ballot}] with quorum [{have}/{need}]")]
    NoConsensus {
        ballot: Ballot,
        have: usize,
        need: usize,
    },

    #[error("safety violated: acceptors disagree on the value at ballot [{ballot}]")]
    SafetyViolation { ballot: Ballot },
}

impl NodeError {
    /// Whether a caller may reasonably resubmit after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NodeError::RetryExhausted { .. } | NodeError::Persist(_)
        )
    }
}
