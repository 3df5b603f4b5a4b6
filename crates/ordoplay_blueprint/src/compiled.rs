// SPDX-License-Identifier: MIT OR Apache-2.0
//! The immutable, fully link-resolved form of a graph.
//!
//! Every link is a direct index into [`CompiledGraph::nodes`]; nothing is
//! looked up by name or hash at run time. A compiled graph is built once per
//! load and shared read-only by every running [`Blueprint`](crate::Blueprint).

use crate::behavior::NodeBehavior;
use crate::node::NodeId;
use crate::port::{DataType, Port, PortDirection};
use crate::value::Value;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Index of an embedding scope; scope 0 is the root graph
pub type ScopeId = usize;

/// Direct address of a port in the compiled node array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PortAddress {
    /// Index into the compiled node array
    pub node: usize,
    /// Index into that node's port table
    pub port: usize,
}

impl PortAddress {
    /// Create an address
    pub fn new(node: usize, port: usize) -> Self {
        Self { node, port }
    }
}

/// Where a data input gets its value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DataSource {
    /// Pull from an Output port
    Port(PortAddress),
    /// A constant left behind by subgraph flattening (an unconnected
    /// compound input's default)
    Constant(Value),
    /// Use the reading port's own default
    Default,
}

/// Resolved links of one port
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Wiring {
    /// Enter and Output ports; also unlinked Exit ports
    None,
    /// Exit port fan-out, in link declaration order
    Targets(Box<[PortAddress]>),
    /// Input port source
    Source(DataSource),
}

/// A port with its resolved links
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledPort {
    /// Port schema
    pub port: Port,
    /// Value read when the port is unconnected
    pub default: Value,
    /// Resolved links
    pub wiring: Wiring,
}

impl CompiledPort {
    /// Exit fan-out targets (empty for other ports)
    pub fn targets(&self) -> &[PortAddress] {
        match &self.wiring {
            Wiring::Targets(targets) => targets,
            _ => &[],
        }
    }

    /// Input source
    pub fn source(&self) -> &DataSource {
        match &self.wiring {
            Wiring::Source(source) => source,
            _ => &DataSource::Default,
        }
    }
}

/// One node of the compiled array
#[derive(Clone, Serialize)]
pub struct CompiledNode {
    /// Authored node ID
    pub id: NodeId,
    /// Embedding scope this copy belongs to
    pub scope: ScopeId,
    /// Node type ID
    pub node_type: String,
    /// Port table
    pub ports: Box<[CompiledPort]>,
    #[serde(skip)]
    pub(crate) behavior: Arc<dyn NodeBehavior>,
}

impl CompiledNode {
    /// The node behavior
    pub fn behavior(&self) -> &Arc<dyn NodeBehavior> {
        &self.behavior
    }

    /// Get a port by index
    pub fn port(&self, index: usize) -> Option<&CompiledPort> {
        self.ports.get(index)
    }

    /// Find a port index by name and direction
    pub fn port_index(&self, name: &str, direction: PortDirection) -> Option<usize> {
        self.ports
            .iter()
            .position(|p| p.port.name == name && p.port.direction == direction)
    }
}

impl fmt::Debug for CompiledNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledNode")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("node_type", &self.node_type)
            .field("ports", &self.ports)
            .finish_non_exhaustive()
    }
}

/// One instantiation of a graph asset inside the compiled array
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
    /// Enclosing scope (`None` for the root)
    pub parent: Option<ScopeId>,
    /// Compound node, in the parent scope, that embeds this scope
    pub node: Option<NodeId>,
    /// Graph asset name
    pub graph: String,
}

/// A top-level boundary pin the host can wire to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryPort {
    /// Pin name
    pub name: String,
    /// Direction as seen from outside the graph
    pub direction: PortDirection,
    /// Data type for data pins
    pub data_type: Option<DataType>,
    /// Hash of (direction, type, name)
    pub signature: u32,
    /// External ports of the stubs behind this pin, first stub first
    pub stubs: Box<[PortAddress]>,
}

/// Immutable executable form of a graph
#[derive(Debug, Clone, Serialize)]
pub struct CompiledGraph {
    name: String,
    nodes: Vec<CompiledNode>,
    scopes: Vec<Scope>,
    boundary: Vec<BoundaryPort>,
}

impl CompiledGraph {
    pub(crate) fn new(
        name: String,
        nodes: Vec<CompiledNode>,
        scopes: Vec<Scope>,
        boundary: Vec<BoundaryPort>,
    ) -> Self {
        Self {
            name,
            nodes,
            scopes,
            boundary,
        }
    }

    /// Root graph name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All compiled nodes
    pub fn nodes(&self) -> &[CompiledNode] {
        &self.nodes
    }

    /// Get a node by index
    pub fn node(&self, index: usize) -> Option<&CompiledNode> {
        self.nodes.get(index)
    }

    /// Number of compiled nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Indices of every copy of an authored node
    pub fn find(&self, id: NodeId) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.id == id)
            .map(|(i, _)| i)
    }

    /// Index of an authored node within one scope
    pub fn find_in_scope(&self, id: NodeId, scope: ScopeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id && n.scope == scope)
    }

    /// Embedding scopes
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Top-level boundary pins
    pub fn boundary_ports(&self) -> &[BoundaryPort] {
        &self.boundary
    }

    /// Find a top-level boundary pin
    pub fn boundary_port(&self, name: &str, direction: PortDirection) -> Option<&BoundaryPort> {
        self.boundary
            .iter()
            .find(|b| b.name == name && b.direction == direction)
    }

    /// Number of resolved links (fan-out targets plus port-sourced inputs)
    pub fn link_count(&self) -> usize {
        self.nodes
            .iter()
            .flat_map(|n| n.ports.iter())
            .map(|p| match &p.wiring {
                Wiring::Targets(targets) => targets.len(),
                Wiring::Source(DataSource::Port(_)) => 1,
                _ => 0,
            })
            .sum()
    }

    /// Binary image of the compiled layout (behaviors excluded)
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }
}
