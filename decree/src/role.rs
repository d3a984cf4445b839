//! Node roles.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The role a node plays in the agreement protocol. Fixed for the lifetime
/// of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Drives proposals through the two-phase exchange.
    Proposer,
    /// Votes on proposals; a quorum of acceptors chooses the value.
    Acceptor,
    /// Receives accepted values for read traffic; never votes.
    Learner,
}

impl Role {
    /// Whether this role handles accept requests.
    #[must_use]
    pub fn accepts(self) -> bool {
        matches!(self, Role::Acceptor | Role::Learner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Proposer => "proposer",
            Role::Acceptor => "acceptor",
            Role::Learner => "learner",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, UnknownRole> {
        match s {
            "proposer" => Ok(Role::Proposer),
            "acceptor" => Ok(Role::Acceptor),
            "learner" => Ok(Role::Learner),
            _ => Err(UnknownRole(s.to_owned())),
        }
    }
}

/// Error parsing a role name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role [{}]", self.0)
    }
}

impl std::error::Error for UnknownRole {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_display() {
        for role in [Role::Proposer, Role::Acceptor, Role::Learner] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("commander".parse::<Role>().is_err());
    }
}
