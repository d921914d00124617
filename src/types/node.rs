//! Node identity, role and lifecycle types

use serde::{Deserialize, Serialize};
use std::fmt;

use super::constants::ROOT_ID;

/// Radio address of a mote.
///
/// Zero never names a real mote; it fills unused provenance slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u16);

impl NodeId {
    /// The sink of the collection tree.
    pub const ROOT: NodeId = NodeId(ROOT_ID);

    /// Empty provenance slot.
    pub const EMPTY: NodeId = NodeId(0);

    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for NodeId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// What the routing layer reports about the outbound hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEstimate {
    /// Link-quality metric, meaning fixed by the routing layer
    pub quality: u16,
    /// Parent the next transmission goes to
    pub next_hop: NodeId,
}

impl LinkEstimate {
    pub const fn new(quality: u16, next_hop: NodeId) -> Self {
        Self { quality, next_hop }
    }
}

/// Static role of a node, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Samples and sends, never forwards
    Leaf,
    /// Samples and forwards traffic from its subtree
    Relay,
    /// Sink bridging radio traffic to the serial uplink
    Root,
}

/// Operations a role is allowed to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub samples: bool,
    pub forwards: bool,
    pub aggregates: bool,
}

impl NodeRole {
    /// Select the role by comparing the local id against the root id.
    pub fn select(local: NodeId, root: NodeId, forwarding: bool) -> Self {
        if local == root {
            NodeRole::Root
        } else if forwarding {
            NodeRole::Relay
        } else {
            NodeRole::Leaf
        }
    }

    pub const fn capabilities(self) -> Capabilities {
        match self {
            NodeRole::Leaf => Capabilities { samples: true, forwards: false, aggregates: false },
            NodeRole::Relay => Capabilities { samples: true, forwards: true, aggregates: false },
            NodeRole::Root => Capabilities { samples: false, forwards: false, aggregates: true },
        }
    }

    /// State entered when the node leaves `Idle`.
    pub const fn active_state(self) -> NodeState {
        match self {
            NodeRole::Leaf => NodeState::Sampling,
            NodeRole::Relay => NodeState::Forwarding,
            NodeRole::Root => NodeState::Aggregating,
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeRole::Leaf => "leaf",
            NodeRole::Relay => "relay",
            NodeRole::Root => "root",
        };
        f.write_str(name)
    }
}

/// Node lifecycle. `Idle` is left exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Idle,
    Sampling,
    Forwarding,
    Aggregating,
}

/// Outbound interface a queue feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    Radio,
    Serial,
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueKind::Radio => f.write_str("radio"),
            QueueKind::Serial => f.write_str("serial"),
        }
    }
}
