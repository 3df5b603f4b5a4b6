// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the graph.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId(pub Uuid);

impl LinkId {
    /// Create a new random link ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

/// One end of a link: a node and one of its ports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    /// Node ID
    pub node: NodeId,
    /// Port index at authoring time
    pub index: usize,
    /// Port name at authoring time; used to re-find a port whose index moved
    #[serde(default)]
    pub name: String,
}

impl PortRef {
    /// Reference a port by index only
    pub fn new(node: NodeId, index: usize) -> Self {
        Self {
            node,
            index,
            name: String::new(),
        }
    }

    /// Reference a port by index, recording its name
    pub fn named(node: NodeId, index: usize, name: impl Into<String>) -> Self {
        Self {
            node,
            index,
            name: name.into(),
        }
    }
}

/// A directed link between two ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Unique link ID
    pub id: LinkId,
    /// Source (Exit or Output) port
    pub from: PortRef,
    /// Target (Enter or Input) port
    pub to: PortRef,
}

impl Link {
    /// Create a new link
    pub fn new(from: PortRef, to: PortRef) -> Self {
        Self {
            id: LinkId::new(),
            from,
            to,
        }
    }

    /// Check if this link involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from.node == node_id || self.to.node == node_id
    }

    /// Check if this link touches a specific port
    pub fn involves_port(&self, node_id: NodeId, index: usize) -> bool {
        (self.from.node == node_id && self.from.index == index)
            || (self.to.node == node_id && self.to.index == index)
    }
}
