//! The proposal driver: prepare, accept, commit, retry.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, instrument, trace};

use crate::ballot::Ballot;
use crate::error::NodeError;
use crate::messages::Accepted;
use crate::node::Node;
use crate::quorum::fan_out;
use crate::role::Role;

/// Outcome of one prepare phase.
enum Prepared {
    /// A quorum of acceptors promised this ballot.
    Quorum,
    /// An acceptor already accepted a value at a ballot at least as high;
    /// that value must be carried forward.
    Adopted { ballot: Ballot, value: String },
    /// An acceptor promised a strictly higher ballot; retry above it.
    Superseded { promised: Ballot },
    /// Too few acceptors answered; retry after backoff.
    NoQuorum { promised: usize },
}

/// Drive `value` to consensus, retrying with fresh ballots on conflict.
///
/// Returns the committed state; its value is either the submitted one or a
/// previously chosen value adopted during prepare. Conflicts and unreachable
/// peers are absorbed here; only persistence failures and retry exhaustion
/// escape to the caller.
#[instrument(skip_all, name = "propose", fields(node = %node.addr()))]
pub(crate) async fn run(node: &Node, value: String) -> Result<Accepted, NodeError> {
    let config = node.propose_config().clone();
    let mut rng = StdRng::from_os_rng();
    let mut value = value;

    for attempt in 0..config.max_tries {
        let view = node.view().await?;
        let ballot = Ballot::new(view.accepted.round + 1, node.ordinal());
        node.state().begin(ballot).await?;
        debug!(attempt, %ballot, "prepare phase");

        match prepare_phase(node, ballot).await {
            Prepared::Quorum => {
                debug!(%ballot, "promise quorum, accept phase");
                accept_phase(node, ballot, &value).await;
                let state = node.state().commit(ballot, value).await?;
                info!(%ballot, value = %state.value, "proposal committed");
                return Ok(Accepted::from(state));
            }
            Prepared::Adopted {
                ballot: theirs,
                value: adopted,
            } => {
                debug!(%theirs, "adopting previously accepted value");
                node.state().commit(theirs, adopted.clone()).await?;
                value = adopted;
            }
            Prepared::Superseded { promised } => {
                debug!(%promised, "superseded by a competing ballot");
                let current = node.view().await?;
                node.state().commit(promised, current.value).await?;
            }
            Prepared::NoQuorum { promised } => {
                debug!(promised, need = node.quorum(), "prepare fell short of quorum");
            }
        }

        let delay = config.backoff(&mut rng);
        trace!(?delay, "backing off before retry");
        tokio::time::sleep(delay).await;
    }

    Err(NodeError::RetryExhausted {
        tries: config.max_tries,
    })
}

/// Fan prepare out to all acceptors and classify the replies, exiting as
/// soon as a quorum of promises or any conflict is seen.
async fn prepare_phase(node: &Node, ballot: Ballot) -> Prepared {
    let acceptors = node.members_of(Role::Acceptor);
    let client = node.peers().clone();
    let mut rx = fan_out(&acceptors, |addr| {
        let client = client.clone();
        async move { client.prepare(&addr, ballot).await }
    });

    let mut promised = 0usize;
    for _ in 0..acceptors.len() {
        let Some(promise) = rx.recv().await else {
            break;
        };
        if let Some(err) = &promise.error {
            debug!(from = %promise.from, %err, "acceptor unreachable during prepare");
            continue;
        }

        // An accepted value at or above our ballot wins outright; check it
        // before the promise field, which is always at least as high and
        // would otherwise mask the value.
        if promise.accepted >= ballot {
            return Prepared::Adopted {
                ballot: promise.accepted,
                value: promise.value,
            };
        }
        if promise.promised > ballot {
            return Prepared::Superseded {
                promised: promise.promised,
            };
        }
        if promise.promised == ballot {
            promised += 1;
            if promised >= node.quorum() {
                return Prepared::Quorum;
            }
        } else {
            // Stale reply below our ballot; the acceptor never saw us.
            trace!(from = %promise.from, promised = %promise.promised, "stale promise");
        }
    }

    Prepared::NoQuorum { promised }
}

/// Fan accept out to all acceptors and learners and drain every reply.
/// Acceptors enforce safety on their own, so higher-ballot evidence is only
/// recorded for observability.
async fn accept_phase(node: &Node, ballot: Ballot, value: &str) {
    let targets = node.accept_targets();
    let client = node.peers().clone();
    let value_owned = value.to_owned();
    let mut rx = fan_out(&targets, move |addr| {
        let client = client.clone();
        let value = value_owned.clone();
        async move { client.accept(&addr, ballot, &value).await }
    });

    let mut acked = 0usize;
    for _ in 0..targets.len() {
        let Some(promise) = rx.recv().await else {
            break;
        };
        if let Some(err) = &promise.error {
            debug!(from = %promise.from, %err, "peer unreachable during accept");
        } else if promise.promised > ballot || promise.accepted > ballot {
            debug!(
                from = %promise.from,
                promised = %promise.promised,
                accepted = %promise.accepted,
                "higher ballot observed during accept"
            );
        } else {
            acked += 1;
        }
    }
    debug!(acked, total = targets.len(), %ballot, "accept phase complete");
}
