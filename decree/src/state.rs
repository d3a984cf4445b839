//! Single-owner state actor.
//!
//! One task per node owns the mutable [`BallotState`] and the durable store;
//! request handlers and the proposal driver talk to it through a command
//! inbox. Replies are value snapshots taken by the owner, so commits within
//! a node are totally ordered and nothing else ever touches the file.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::ballot::{AcceptOutcome, Ballot, BallotState, PrepareOutcome};
use crate::error::NodeError;
use crate::persist::BallotStore;
use crate::role::Role;

const INBOX_CAPACITY: usize = 64;

type Reply = oneshot::Sender<Result<BallotState, NodeError>>;

#[derive(Debug)]
enum Command {
    /// Phase 1: promise `ballot` if it is the highest seen.
    Prepare { ballot: Ballot, reply: Reply },
    /// Phase 2: install `(ballot, value)` under the role's accept rule.
    Accept {
        ballot: Ballot,
        value: String,
        reply: Reply,
    },
    /// Proposer bookkeeping: record the ballot about to be driven.
    Begin { ballot: Ballot, reply: Reply },
    /// Proposer-side local or catch-up commit.
    Commit {
        ballot: Ballot,
        value: String,
        reply: Reply,
    },
    /// Read a snapshot.
    View { reply: Reply },
    /// Flush and close the store, then stop.
    Close { reply: oneshot::Sender<Result<(), NodeError>> },
}

/// Handle to a node's state actor. Cheap to clone; all clones feed the same
/// inbox.
#[derive(Clone, Debug)]
pub(crate) struct StateHandle {
    tx: mpsc::Sender<Command>,
}

impl StateHandle {
    /// Spawn the actor that owns `state` and `store`.
    pub(crate) fn spawn(role: Role, store: BallotStore, state: BallotState) -> Self {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        tokio::spawn(run(role, store, state, rx));
        StateHandle { tx }
    }

    pub(crate) async fn prepare(&self, ballot: Ballot) -> Result<BallotState, NodeError> {
        self.send(|reply| Command::Prepare { ballot, reply }).await
    }

    pub(crate) async fn accept(
        &self,
        ballot: Ballot,
        value: String,
    ) -> Result<BallotState, NodeError> {
        self.send(|reply| Command::Accept {
            ballot,
            value,
            reply,
        })
        .await
    }

    pub(crate) async fn begin(&self, ballot: Ballot) -> Result<BallotState, NodeError> {
        self.send(|reply| Command::Begin { ballot, reply }).await
    }

    pub(crate) async fn commit(
        &self,
        ballot: Ballot,
        value: String,
    ) -> Result<BallotState, NodeError> {
        self.send(|reply| Command::Commit {
            ballot,
            value,
            reply,
        })
        .await
    }

    pub(crate) async fn view(&self) -> Result<BallotState, NodeError> {
        self.send(|reply| Command::View { reply }).await
    }

    /// Close the durable store and stop the actor. Later commands fail with
    /// [`NodeError::StateClosed`].
    pub(crate) async fn close(&self) -> Result<(), NodeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Close { reply })
            .await
            .map_err(|_| NodeError::StateClosed)?;
        rx.await.map_err(|_| NodeError::StateClosed)?
    }

    async fn send(
        &self,
        make: impl FnOnce(Reply) -> Command,
    ) -> Result<BallotState, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| NodeError::StateClosed)?;
        rx.await.map_err(|_| NodeError::StateClosed)?
    }
}

async fn run(
    role: Role,
    mut store: BallotStore,
    mut state: BallotState,
    mut rx: mpsc::Receiver<Command>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Prepare { ballot, reply } => {
                let result = handle_prepare(&mut store, &mut state, ballot).await;
                let _ = reply.send(result);
            }
            Command::Accept {
                ballot,
                value,
                reply,
            } => {
                let result = handle_accept(role, &mut store, &mut state, ballot, &value).await;
                let _ = reply.send(result);
            }
            Command::Begin { ballot, reply } => {
                state.begin(ballot);
                let _ = reply.send(Ok(state.clone()));
            }
            Command::Commit {
                ballot,
                value,
                reply,
            } => {
                let result = handle_commit(&mut store, &mut state, ballot, &value).await;
                let _ = reply.send(result);
            }
            Command::View { reply } => {
                let _ = reply.send(Ok(state.clone()));
            }
            Command::Close { reply } => {
                let result = store.close().await.map_err(NodeError::from);
                let _ = reply.send(result);
                return;
            }
        }
    }
    // All handles dropped without an explicit close; still release the file.
    let _ = store.close().await;
}

/// Apply a transition that must be durable before it is acknowledged. On a
/// write failure the in-memory state is left as it was.
async fn persist_transition(
    store: &mut BallotStore,
    state: &mut BallotState,
    next: BallotState,
) -> Result<BallotState, NodeError> {
    store.write(&next).await?;
    *state = next;
    Ok(state.clone())
}

async fn handle_prepare(
    store: &mut BallotStore,
    state: &mut BallotState,
    ballot: Ballot,
) -> Result<BallotState, NodeError> {
    let mut next = state.clone();
    match next.prepare(ballot) {
        PrepareOutcome::Promised => {
            trace!(%ballot, "promised");
            persist_transition(store, state, next).await
        }
        PrepareOutcome::Superseded => {
            debug!(%ballot, promised = %state.promised, "prepare superseded");
            Ok(state.clone())
        }
    }
}

async fn handle_accept(
    role: Role,
    store: &mut BallotStore,
    state: &mut BallotState,
    ballot: Ballot,
    value: &str,
) -> Result<BallotState, NodeError> {
    let mut next = state.clone();
    let outcome = match role {
        Role::Learner => next.observe(ballot, value),
        _ => next.accept(ballot, value),
    };
    match outcome {
        AcceptOutcome::Accepted => {
            trace!(%ballot, "accepted");
            persist_transition(store, state, next).await
        }
        AcceptOutcome::Rejected => {
            debug!(%ballot, promised = %state.promised, "accept rejected");
            Ok(state.clone())
        }
    }
}

async fn handle_commit(
    store: &mut BallotStore,
    state: &mut BallotState,
    ballot: Ballot,
    value: &str,
) -> Result<BallotState, NodeError> {
    let mut next = state.clone();
    next.commit(ballot, value);
    persist_transition(store, state, next).await
}
