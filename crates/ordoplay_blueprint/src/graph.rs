// SPDX-License-Identifier: MIT OR Apache-2.0
//! Authored graph assets: nodes, links and the asset library.

use crate::connection::{Link, LinkId, PortRef};
use crate::node::{Node, NodeConfig, NodeId};
use crate::port::PortDirection;
use crate::types::TypeRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current graph asset format version
pub const GRAPH_FORMAT_VERSION: u32 = 2;

fn format_version() -> u32 {
    GRAPH_FORMAT_VERSION
}

/// An authored node graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    /// Asset format version
    #[serde(default = "format_version")]
    pub version: u32,
    /// Graph name (key in a [`GraphLibrary`])
    pub name: String,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Links between ports, in declaration order
    #[serde(default)]
    links: IndexMap<LinkId, Link>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: GRAPH_FORMAT_VERSION,
            name: name.into(),
            nodes: IndexMap::new(),
            links: IndexMap::new(),
        }
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node and its links
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        self.links.retain(|_, l| !l.involves_node(node_id));
        self.nodes.shift_remove(&node_id)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Replace a node's configuration.
    ///
    /// Cached ports are left alone; use
    /// [`Compiler::reconfigure`](crate::compiler::Compiler::reconfigure) to
    /// also recompute ports and re-validate links.
    pub fn set_config(&mut self, node_id: NodeId, config: NodeConfig) -> bool {
        match self.nodes.get_mut(&node_id) {
            Some(node) => {
                node.config = config;
                true
            }
            None => false,
        }
    }

    /// Add a link without validation; the compiler validates every link
    pub fn add_link(&mut self, from: PortRef, to: PortRef) -> LinkId {
        let link = Link::new(from, to);
        let id = link.id;
        self.links.insert(id, link);
        id
    }

    /// Add a link between cached ports, validating it first against the
    /// same type rules the compiler applies
    pub fn connect(&mut self, types: &TypeRegistry, from: PortRef, to: PortRef) -> Result<LinkId, ConnectionError> {
        let source_node = self.nodes.get(&from.node)
            .ok_or(ConnectionError::NodeNotFound(from.node))?;
        let target_node = self.nodes.get(&to.node)
            .ok_or(ConnectionError::NodeNotFound(to.node))?;

        let source_port = source_node.port(from.index)
            .ok_or(ConnectionError::PortNotFound(from.node, from.index))?;
        let target_port = target_node.port(to.index)
            .ok_or(ConnectionError::PortNotFound(to.node, to.index))?;

        if !source_port.can_link_to(target_port) {
            return Err(ConnectionError::IncompatiblePorts);
        }
        if let (Some(output), Some(input)) = (&source_port.data_type, &target_port.data_type) {
            if !types.accepts(input, output) {
                return Err(ConnectionError::IncompatiblePorts);
            }
        }

        // Data inputs take a single source
        if target_port.direction == PortDirection::Input {
            if from.node == to.node {
                return Err(ConnectionError::SelfLoop);
            }
            if self.links_to(to.node, to.index).next().is_some() {
                return Err(ConnectionError::PortAlreadyConnected(to.node, to.index));
            }
        }

        let from = PortRef::named(from.node, from.index, source_port.name.clone());
        let to = PortRef::named(to.node, to.index, target_port.name.clone());
        Ok(self.add_link(from, to))
    }

    /// Remove a link
    pub fn disconnect(&mut self, link_id: LinkId) -> Option<Link> {
        self.links.shift_remove(&link_id)
    }

    /// Remove every link touching a port
    pub fn disconnect_port(&mut self, node_id: NodeId, index: usize) -> usize {
        let before = self.links.len();
        self.links.retain(|_, l| !l.involves_port(node_id, index));
        before - self.links.len()
    }

    /// Get a link by ID
    pub fn link(&self, link_id: LinkId) -> Option<&Link> {
        self.links.get(&link_id)
    }

    /// Get all links in declaration order
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Get links leaving a specific port
    pub fn links_from(&self, node_id: NodeId, index: usize) -> impl Iterator<Item = &Link> {
        self.links.values()
            .filter(move |l| l.from.node == node_id && l.from.index == index)
    }

    /// Get links arriving at a specific port
    pub fn links_to(&self, node_id: NodeId, index: usize) -> impl Iterator<Item = &Link> {
        self.links.values()
            .filter(move |l| l.to.node == node_id && l.to.index == index)
    }

    /// Get links involving a node
    pub fn links_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Link> {
        self.links.values().filter(move |l| l.involves_node(node_id))
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Keep only the links for which `keep` returns true
    pub(crate) fn retain_links(&mut self, mut keep: impl FnMut(&mut Link) -> bool) {
        self.links.retain(|_, l| keep(l));
    }

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Deserialize from RON, rejecting assets from a newer format
    pub fn from_ron(s: &str) -> Result<Self, AssetError> {
        let graph: Graph = ron::from_str(s)?;
        graph.check_version()
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, AssetError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON, rejecting assets from a newer format
    pub fn from_json(s: &str) -> Result<Self, AssetError> {
        let graph: Graph = serde_json::from_str(s)?;
        graph.check_version()
    }

    /// Load a graph asset; `.json` files are read as JSON, anything else as RON
    pub fn load(path: &Path) -> Result<Self, AssetError> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_ron(&content),
        }
    }

    /// Save a graph asset as RON
    pub fn save(&self, path: &Path) -> Result<(), AssetError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    fn check_version(self) -> Result<Self, AssetError> {
        if self.version > GRAPH_FORMAT_VERSION {
            return Err(AssetError::UnsupportedVersion {
                found: self.version,
                supported: GRAPH_FORMAT_VERSION,
            });
        }
        Ok(self)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Named graph assets that subgraph nodes can reference
#[derive(Debug, Clone, Default)]
pub struct GraphLibrary {
    graphs: IndexMap<String, Graph>,
}

impl GraphLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a graph, keyed by its name
    pub fn insert(&mut self, graph: Graph) {
        self.graphs.insert(graph.name.clone(), graph);
    }

    /// Builder-style insert
    pub fn with(mut self, graph: Graph) -> Self {
        self.insert(graph);
        self
    }

    /// Get a graph by name
    pub fn get(&self, name: &str) -> Option<&Graph> {
        self.graphs.get(name)
    }

    /// Get all graphs
    pub fn graphs(&self) -> impl Iterator<Item = &Graph> {
        self.graphs.values()
    }

    /// Load every `.ron` and `.json` asset in a directory, in file name order
    pub fn load_dir(path: &Path) -> Result<Self, AssetError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let path = entry?.path();
            let is_asset = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("ron" | "json")
            );
            if path.is_file() && is_asset {
                paths.push(path);
            }
        }
        paths.sort();

        let mut library = Self::new();
        for path in paths {
            let graph = Graph::load(&path)?;
            tracing::debug!("Loaded graph asset {:?} from {:?}", graph.name, path);
            library.insert(graph);
        }
        Ok(library)
    }
}

/// Error when creating a link in the editor
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port {1} not found on node {0}")]
    PortNotFound(NodeId, usize),

    /// Incompatible port directions or types
    #[error("Incompatible ports")]
    IncompatiblePorts,

    /// Input already has a source
    #[error("Port {1} on node {0} is already connected")]
    PortAlreadyConnected(NodeId, usize),

    /// Data self-loop not allowed
    #[error("Data self-loop not allowed")]
    SelfLoop,
}

/// Error when loading or saving assets
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// RON parse failure
    #[error("RON parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// RON write failure
    #[error("RON write error: {0}")]
    RonWrite(#[from] ron::Error),

    /// JSON failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Asset written by a newer format
    #[error("asset version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found in the asset
        found: u32,
        /// Highest supported version
        supported: u32,
    },
}
