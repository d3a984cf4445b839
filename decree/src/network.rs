//! In-process networks for tests and demos.

use std::collections::BTreeMap;

use futures::future::join_all;
use tracing::warn;

use crate::ballot::Ballot;
use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::node::{Node, NodeHandle};
use crate::role::Role;

/// An ordered collection of running nodes sharing one membership map. Owns
/// their lifecycle.
#[derive(Debug)]
pub struct Network {
    handles: Vec<NodeHandle>,
}

impl Network {
    /// Start `proposers + acceptors + learners` nodes on consecutive ports
    /// from `base_port`, roles assigned in that order.
    ///
    /// # Errors
    ///
    /// Rejects even acceptor counts before any socket is opened; fails on
    /// bind or persistence errors.
    pub async fn start(
        base_port: u16,
        proposers: usize,
        acceptors: usize,
        learners: usize,
        config: &NodeConfig,
    ) -> Result<Network, NodeError> {
        if acceptors % 2 != 1 {
            return Err(NodeError::EvenAcceptors { count: acceptors });
        }

        let mut assignments = Vec::new();
        let mut port = base_port;
        for i in 0..proposers + acceptors + learners {
            let role = if i < proposers {
                Role::Proposer
            } else if i < proposers + acceptors {
                Role::Acceptor
            } else {
                Role::Learner
            };
            assignments.push((format!("127.0.0.1:{port}"), role));
            port += 1;
        }
        let membership: BTreeMap<String, Role> = assignments.iter().cloned().collect();

        let mut nodes = Vec::new();
        for (addr, role) in &assignments {
            nodes.push(Node::new(*role, addr.clone(), membership.clone(), config).await?);
        }

        let mut handles = Vec::new();
        for node in &nodes {
            handles.push(node.start().await?);
        }

        Ok(Network { handles })
    }

    /// All nodes, in construction order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.handles.iter().map(NodeHandle::node)
    }

    /// Nodes holding the given role, in construction order.
    #[must_use]
    pub fn members(&self, role: Role) -> Vec<&Node> {
        self.nodes().filter(|node| node.role() == role).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Decide what the network has agreed on, if anything.
    ///
    /// Finds the highest accepted ballot across all nodes, then counts
    /// acceptors holding that exact ballot. A disagreeing value among them is
    /// a broken safety property; fewer than a quorum means no consensus yet.
    ///
    /// # Errors
    ///
    /// [`NodeError::SafetyViolation`] if two acceptors disagree at the
    /// highest ballot, [`NodeError::NoConsensus`] if no quorum holds it.
    pub async fn consensus(&self) -> Result<(Ballot, String), NodeError> {
        let mut top = Ballot::ZERO;
        let mut value = String::new();
        let mut quorum = 0;
        let mut views = Vec::new();

        for node in self.nodes() {
            let view = node.view().await?;
            if view.accepted > top {
                top = view.accepted;
                value.clone_from(&view.value);
            }
            quorum = node.quorum();
            views.push((node.role(), view));
        }

        let mut agreed = 0usize;
        for (role, view) in &views {
            if *role != Role::Acceptor || view.accepted != top {
                continue;
            }
            if view.value != value {
                return Err(NodeError::SafetyViolation { ballot: top });
            }
            agreed += 1;
        }

        if top.is_zero() || agreed < quorum {
            return Err(NodeError::NoConsensus {
                ballot: top,
                have: agreed,
                need: quorum,
            });
        }
        Ok((top, value))
    }

    /// Fan out shutdown to every node and drain their completions.
    ///
    /// # Errors
    ///
    /// Returns the first shutdown failure after all nodes have stopped.
    pub async fn shutdown(self) -> Result<(), NodeError> {
        let results = join_all(self.handles.into_iter().map(NodeHandle::shutdown)).await;

        let mut first_err = None;
        for result in results {
            if let Err(err) = result {
                warn!(%err, "node shutdown failed");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
