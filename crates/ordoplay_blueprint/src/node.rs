// SPDX-License-Identifier: MIT OR Apache-2.0
//! Authored node definitions and the node type registry.

use crate::behavior::NodeBehavior;
use crate::port::Port;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a node, stable within one graph asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Event entry points
    Event,
    /// Logic/flow control
    Flow,
    /// Math and value nodes
    Math,
    /// Time-based nodes
    Time,
    /// Subgraph composition
    Composition,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    Custom,
}

/// Per-node configuration data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeConfig(IndexMap<String, Value>);

impl NodeConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.set(key, value);
        self
    }

    /// Set a value
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Get a raw value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a string value
    pub fn string(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Get an integer value
    pub fn int(&self, key: &str) -> Option<i32> {
        match self.get(key) {
            Some(Value::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Get a float value (integers widen)
    pub fn float(&self, key: &str) -> Option<f32> {
        match self.get(key) {
            Some(Value::Float(v)) => Some(*v),
            Some(Value::Int(v)) => Some(*v as f32),
            _ => None,
        }
    }

    /// Get a string value or fail with a config error
    pub fn require_string(&self, key: &str) -> Result<&str, NodeConfigError> {
        self.string(key)
            .ok_or_else(|| NodeConfigError::Missing(key.to_string()))
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// A node instance in an authored graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node type ID (key into the [`NodeRegistry`])
    pub node_type: String,
    /// Display name (can be customized)
    pub name: String,
    /// Position in the graph UI
    #[serde(default)]
    pub position: [f32; 2],
    /// Configuration data
    #[serde(default)]
    pub config: NodeConfig,
    /// Ports from the last refresh; the compiler always recomputes them
    #[serde(default)]
    pub ports: Vec<Port>,
}

impl Node {
    /// Create a new node of the given type
    pub fn new(node_type: impl Into<String>) -> Self {
        let node_type = node_type.into();
        Self {
            id: NodeId::new(),
            name: node_type.clone(),
            node_type,
            position: [0.0, 0.0],
            config: NodeConfig::new(),
            ports: Vec::new(),
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Set a configuration value
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.set(key, value);
        self
    }

    /// Set the cached ports
    pub fn with_ports(mut self, ports: Vec<Port>) -> Self {
        self.ports = ports;
        self
    }

    /// Get a cached port by index
    pub fn port(&self, index: usize) -> Option<&Port> {
        self.ports.get(index)
    }

    /// Find a cached port index by name
    pub fn port_index(&self, name: &str) -> Option<usize> {
        self.ports.iter().position(|p| p.name == name)
    }
}

/// Error raised by a node factory for an invalid configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NodeConfigError {
    /// Required key missing
    #[error("missing config key {0:?}")]
    Missing(String),

    /// Key present with an unusable value
    #[error("invalid value for config key {key:?}: {reason}")]
    Invalid {
        /// Config key
        key: String,
        /// What was wrong
        reason: String,
    },
}

/// Factory building a node behavior from its configuration
pub type NodeFactory =
    Arc<dyn Fn(&NodeConfig) -> Result<Arc<dyn NodeBehavior>, NodeConfigError> + Send + Sync>;

/// Node type definition
#[derive(Clone)]
pub struct NodeType {
    /// Unique, stable type identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Behavior factory
    pub factory: NodeFactory,
}

impl NodeType {
    /// Create a node type from a factory function
    pub fn new<F>(id: impl Into<String>, name: impl Into<String>, category: NodeCategory, factory: F) -> Self
    where
        F: Fn(&NodeConfig) -> Result<Arc<dyn NodeBehavior>, NodeConfigError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            description: String::new(),
            factory: Arc::new(factory),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Build a behavior for a configuration
    pub fn instantiate(&self, config: &NodeConfig) -> Result<Arc<dyn NodeBehavior>, NodeConfigError> {
        (self.factory)(config)
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

/// Registry of available node types, keyed by stable identifier
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    /// Registered node types by ID
    types: IndexMap<String, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Register a node type
    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.id.clone(), node_type);
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Create an authored node from a type ID
    pub fn create_node(&self, type_id: &str) -> Option<Node> {
        self.get(type_id).map(|t| {
            let mut node = Node::new(t.id.clone());
            node.name = t.name.clone();
            node
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_getters() {
        let config = NodeConfig::new()
            .with("text", Value::String("hi".into()))
            .with("count", Value::Int(3));

        assert_eq!(config.string("text"), Some("hi"));
        assert_eq!(config.int("count"), Some(3));
        assert_eq!(config.float("count"), Some(3.0));
        assert_eq!(config.string("count"), None);
        assert_eq!(
            config.require_string("missing"),
            Err(NodeConfigError::Missing("missing".into()))
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = NodeConfig::new().with("label", Value::String("loop".into()));
        let ron_str = ron::to_string(&config).unwrap();
        let loaded: NodeConfig = ron::from_str(&ron_str).unwrap();
        assert_eq!(loaded, config);
    }
}
