//! Node construction and lifecycle.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api;
use crate::ballot::BallotState;
use crate::client::PeerClient;
use crate::config::{NodeConfig, ProposeConfig};
use crate::error::NodeError;
use crate::messages::Accepted;
use crate::persist::BallotStore;
use crate::role::Role;
use crate::state::StateHandle;

/// Bound on draining in-flight requests during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug)]
struct Inner {
    role: Role,
    addr: String,
    ordinal: u64,
    members: BTreeMap<String, Role>,
    quorum: usize,
    state: StateHandle,
    peers: PeerClient,
    propose: ProposeConfig,
}

/// A single process in the agreement network. Cheap to clone; clones share
/// the same state actor.
#[derive(Clone, Debug)]
pub struct Node {
    inner: Arc<Inner>,
}

impl Node {
    /// Create a node with the given role, address and full membership map
    /// (which must include this node's own address).
    ///
    /// # Errors
    ///
    /// Rejects memberships whose acceptor count is even (quorum would be
    /// ambiguous), memberships that do not list `addr`, and persistence
    /// failures while opening or restoring the state file.
    pub async fn new(
        role: Role,
        addr: impl Into<String>,
        membership: BTreeMap<String, Role>,
        config: &NodeConfig,
    ) -> Result<Node, NodeError> {
        let addr = addr.into();

        let acceptors = membership
            .values()
            .filter(|role| **role == Role::Acceptor)
            .count();
        if acceptors % 2 != 1 {
            return Err(NodeError::EvenAcceptors { count: acceptors });
        }
        let quorum = acceptors / 2 + 1;

        // The ordinal is the node's index in the sorted full membership:
        // stable, and distinct across all nodes that share the map.
        let ordinal = membership
            .keys()
            .position(|member| *member == addr)
            .ok_or_else(|| NodeError::UnknownSelf { addr: addr.clone() })?
            as u64;

        let members: BTreeMap<String, Role> = membership
            .into_iter()
            .filter(|(member, _)| *member != addr)
            .collect();

        let (store, restored) =
            BallotStore::open(&config.store, role, &addr, quorum, &members).await?;
        let state = StateHandle::spawn(role, store, restored.unwrap_or_default());

        Ok(Node {
            inner: Arc::new(Inner {
                role,
                addr,
                ordinal,
                members,
                quorum,
                state,
                peers: PeerClient::new(),
                propose: config.propose.clone(),
            }),
        })
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.inner.role
    }

    #[must_use]
    pub fn addr(&self) -> &str {
        &self.inner.addr
    }

    #[must_use]
    pub fn quorum(&self) -> usize {
        self.inner.quorum
    }

    #[must_use]
    pub fn ordinal(&self) -> u64 {
        self.inner.ordinal
    }

    /// Peer addresses with the given role, self excluded.
    #[must_use]
    pub fn members_of(&self, role: Role) -> Vec<String> {
        self.inner
            .members
            .iter()
            .filter(|(_, member_role)| **member_role == role)
            .map(|(addr, _)| addr.clone())
            .collect()
    }

    /// Accept-phase distribution list: all acceptors and all learners.
    pub(crate) fn accept_targets(&self) -> Vec<String> {
        self.inner
            .members
            .iter()
            .filter(|(_, role)| role.accepts())
            .map(|(addr, _)| addr.clone())
            .collect()
    }

    pub(crate) fn state(&self) -> &StateHandle {
        &self.inner.state
    }

    pub(crate) fn peers(&self) -> &PeerClient {
        &self.inner.peers
    }

    pub(crate) fn propose_config(&self) -> &ProposeConfig {
        &self.inner.propose
    }

    /// Snapshot of this node's accepted state.
    ///
    /// # Errors
    ///
    /// Fails once the node has shut down.
    pub async fn accepted(&self) -> Result<Accepted, NodeError> {
        self.inner.state.view().await.map(Accepted::from)
    }

    pub(crate) async fn view(&self) -> Result<BallotState, NodeError> {
        self.inner.state.view().await
    }

    /// Bind the listener and serve requests until shutdown.
    ///
    /// # Errors
    ///
    /// Fails if the address cannot be bound.
    pub async fn start(&self) -> Result<NodeHandle, NodeError> {
        let listener = TcpListener::bind(self.addr()).await.map_err(|source| {
            NodeError::Bind {
                addr: self.addr().to_owned(),
                source,
            }
        })?;
        info!(role = %self.role(), addr = %self.addr(), quorum = self.quorum(), "node listening");

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let app = api::router(self.clone());
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.changed().await;
                })
                .await
        });

        Ok(NodeHandle {
            node: self.clone(),
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// A running node: the serving task plus its shutdown trigger.
#[derive(Debug)]
pub struct NodeHandle {
    node: Node,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<std::io::Result<()>>,
}

impl NodeHandle {
    #[must_use]
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Stop accepting requests, drain in-flight handlers up to the shutdown
    /// deadline, then close the durable store.
    ///
    /// # Errors
    ///
    /// Fails if closing the state file fails.
    pub async fn shutdown(mut self) -> Result<(), NodeError> {
        let _ = self.shutdown.send(true);

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut self.task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => warn!(addr = %self.node.addr(), %err, "serve loop failed"),
            Ok(Err(err)) => warn!(addr = %self.node.addr(), %err, "serve task panicked"),
            Err(_) => {
                warn!(addr = %self.node.addr(), "shutdown deadline hit, aborting");
                self.task.abort();
            }
        }

        self.node.state().close().await?;
        info!(addr = %self.node.addr(), "node stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    fn membership(acceptors: usize) -> BTreeMap<String, Role> {
        let mut members = BTreeMap::from([("127.0.0.1:9000".to_owned(), Role::Proposer)]);
        for i in 0..acceptors {
            members.insert(format!("127.0.0.1:{}", 9001 + i), Role::Acceptor);
        }
        members
    }

    fn config() -> NodeConfig {
        NodeConfig {
            store: StoreConfig::ephemeral(),
            ..NodeConfig::default()
        }
    }

    #[tokio::test]
    async fn even_acceptors_rejected() {
        let err = Node::new(Role::Proposer, "127.0.0.1:9000", membership(2), &config())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::EvenAcceptors { count: 2 }));
    }

    #[tokio::test]
    async fn membership_excludes_self_and_sets_quorum() {
        let node = Node::new(Role::Proposer, "127.0.0.1:9000", membership(3), &config())
            .await
            .unwrap();
        assert_eq!(node.quorum(), 2);
        assert_eq!(node.members_of(Role::Acceptor).len(), 3);
        assert_eq!(node.members_of(Role::Proposer).len(), 0);
    }

    #[tokio::test]
    async fn unlisted_address_rejected() {
        let err = Node::new(Role::Proposer, "127.0.0.1:9999", membership(3), &config())
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::UnknownSelf { .. }));
    }

    #[tokio::test]
    async fn ordinals_follow_sorted_membership() {
        let members = membership(3);
        let proposer = Node::new(Role::Proposer, "127.0.0.1:9000", members.clone(), &config())
            .await
            .unwrap();
        let acceptor = Node::new(Role::Acceptor, "127.0.0.1:9001", members, &config())
            .await
            .unwrap();
        assert_ne!(proposer.ordinal(), acceptor.ordinal());
    }
}
