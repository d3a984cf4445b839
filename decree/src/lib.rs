//! Replicated single-decree agreement service.
//!
//! A fixed set of nodes agrees on one value through a Paxos-style two-phase
//! exchange. Each node holds exactly one role:
//!
//! - **Proposers** drive candidate values through prepare and accept phases
//! - **Acceptors** vote; a majority quorum of them chooses the value
//! - **Learners** receive accepted values and serve reads without voting
//!
//! Nodes expose a small path-encoded HTTP surface and keep their ballot
//! state in a single durable file for crash recovery.
//!
//! # Quick Start
//!
//! ```ignore
//! use decree::{Network, NodeConfig};
//!
//! let network = Network::start(9000, 1, 3, 1, &NodeConfig::default()).await?;
//! // POST http://127.0.0.1:9000/propose/hello, then:
//! let (ballot, value) = network.consensus().await?;
//! network.shutdown().await?;
//! ```

#![warn(clippy::pedantic)]

mod api;
mod ballot;
mod client;
mod config;
mod error;
mod messages;
mod network;
mod node;
mod persist;
mod proposer;
mod quorum;
mod role;
mod state;

pub use ballot::{Ballot, BallotState};
pub use config::{NodeConfig, ProposeConfig, StoreConfig};
pub use error::NodeError;
pub use messages::{Accepted, AlivePeers, Promise};
pub use network::Network;
pub use node::{Node, NodeHandle};
pub use role::Role;
