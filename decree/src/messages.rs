//! Wire payloads exchanged between nodes.

use serde::{Deserialize, Serialize};

use crate::ballot::{Ballot, BallotState};

/// An acceptor's reply to prepare and accept requests.
///
/// Always a snapshot of the acceptor's state after the transition; a reply
/// whose `promised` exceeds the sent ballot signals rejection. The `error`
/// field is filled in by the *caller* when the transport fails; acceptors
/// never serialise one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Promise {
    /// Address of the replying node, for diagnostics.
    pub from: String,
    /// Highest ballot the replier has accepted.
    pub accepted: Ballot,
    /// Highest ballot the replier has promised.
    pub promised: Ballot,
    /// Value associated with `accepted`.
    pub value: String,
    /// Transport failure on the caller side, if any.
    #[serde(skip)]
    pub error: Option<String>,
}

impl Promise {
    /// Build a reply from a state snapshot.
    #[must_use]
    pub fn from_state(from: &str, state: &BallotState) -> Self {
        Promise {
            from: from.to_owned(),
            accepted: state.accepted,
            promised: state.promised,
            value: state.value.clone(),
            error: None,
        }
    }

    /// A placeholder promise recording a failed outbound request. Never
    /// counted toward quorum.
    #[must_use]
    pub fn unreachable(from: &str, error: impl Into<String>) -> Self {
        Promise {
            from: from.to_owned(),
            accepted: Ballot::ZERO,
            promised: Ballot::ZERO,
            value: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Read-model reply for the accepted-value query.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Accepted {
    pub value: String,
    pub accepted: Ballot,
    pub promised: Ballot,
}

impl From<BallotState> for Accepted {
    fn from(state: BallotState) -> Self {
        Accepted {
            value: state.value,
            accepted: state.accepted,
            promised: state.promised,
        }
    }
}

/// Addresses of peers that answered a liveness probe.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AlivePeers {
    pub addrs: Vec<String>,
}
