// SPDX-License-Identifier: MIT OR Apache-2.0
//! The node contract: the interface every node implementation satisfies.
//!
//! Nodes never hold a reference to their graph. The compiler hands them a
//! [`PortMeta`] view while ports are materialized, and the engine hands them
//! the running [`Blueprint`] plus a [`NodeToken`] on every runtime call.

use crate::compiler::SubgraphInterface;
use crate::graph::Graph;
use crate::node::NodeId;
use crate::port::{DataType, Port};
use crate::runtime::{Blueprint, FlowError, NodeToken};
use crate::types::TypeRegistry;
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Lifecycle notifications delivered by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostEvent {
    /// The host started running the graph
    Start,
    /// The owning object was enabled
    Enable,
    /// The owning object was disabled
    Disable,
}

/// Something a node can subscribe to on a running blueprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subscription {
    /// Every host tick
    Tick,
    /// One host lifecycle event
    Host(HostEvent),
}

/// How a compound node embeds its graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubgraphMode {
    /// Merge the inner graph into the enclosing compiled array
    Flatten,
    /// Proxy to a separately running blueprint attached under `runner`
    External {
        /// Runner identifier
        runner: String,
    },
}

/// Reference from a compound node to the graph asset it embeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphRef {
    /// Name of the embedded graph in the library
    pub graph: String,
    /// Embedding mode
    pub mode: SubgraphMode,
}

/// What sits on the other side of a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkedType {
    /// The port has no links
    Unlinked,
    /// Linked ports have not settled on a type yet
    Pending,
    /// Every linked port agrees on this type
    Resolved(DataType),
    /// Linked ports disagree
    Conflict,
}

/// A port reached through an authored link
#[derive(Debug, Clone, Copy)]
pub struct LinkedPort<'a> {
    /// Node on the other end
    pub node: NodeId,
    /// Port index on the other end
    pub index: usize,
    /// The port, if that node has materialized it
    pub port: Option<&'a Port>,
}

/// Read-only view of a graph while its ports are being materialized
pub struct PortMeta<'a> {
    pub(crate) graph: &'a Graph,
    pub(crate) ports: &'a IndexMap<NodeId, Vec<Port>>,
    pub(crate) types: &'a TypeRegistry,
    pub(crate) interfaces: &'a HashMap<String, Arc<SubgraphInterface>>,
}

impl<'a> PortMeta<'a> {
    /// The authored graph
    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    /// Registered data types
    pub fn types(&self) -> &'a TypeRegistry {
        self.types
    }

    /// Ports materialized so far for a node
    pub fn ports(&self, id: NodeId) -> &'a [Port] {
        self.ports.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ports linked to `(id, index)`, in link declaration order
    pub fn linked(&self, id: NodeId, index: usize) -> Vec<LinkedPort<'a>> {
        let ports = self.ports;
        self.graph
            .links()
            .filter_map(|link| {
                let other = if link.from.node == id && link.from.index == index {
                    &link.to
                } else if link.to.node == id && link.to.index == index {
                    &link.from
                } else {
                    return None;
                };
                let port = ports.get(&other.node).and_then(|p| p.get(other.index));
                Some(LinkedPort {
                    node: other.node,
                    index: other.index,
                    port,
                })
            })
            .collect()
    }

    /// Data type expected by whatever is linked to `(id, index)`.
    ///
    /// `Any` on the other side does not constrain the result.
    pub fn linked_type(&self, id: NodeId, index: usize) -> LinkedType {
        let linked = self.linked(id, index);
        if linked.is_empty() {
            return LinkedType::Unlinked;
        }

        let mut resolved: Option<&DataType> = None;
        let mut pending = false;
        let mut saw_any = false;
        for other in &linked {
            match other.port.and_then(|p| p.data_type.as_ref()) {
                None => pending = true,
                Some(DataType::Any) => saw_any = true,
                Some(data_type) => match resolved {
                    Some(existing) if existing != data_type => return LinkedType::Conflict,
                    _ => resolved = Some(data_type),
                },
            }
        }

        match resolved {
            Some(data_type) => LinkedType::Resolved(data_type.clone()),
            None if saw_any && !pending => LinkedType::Resolved(DataType::Any),
            None => LinkedType::Pending,
        }
    }

    /// Derived outer interface of an embedded graph
    pub fn interface(&self, graph: &str) -> Option<&'a SubgraphInterface> {
        self.interfaces.get(graph).map(Arc::as_ref)
    }
}

/// Interface implemented by every node behavior.
///
/// Behaviors are immutable and shared by every running instance of a
/// compiled graph; per-instance state lives in the [`Blueprint`] and is
/// reached through [`Blueprint::state_mut`].
pub trait NodeBehavior: Send + Sync + 'static {
    /// Declare this node's ports. May be called repeatedly while linked
    /// nodes settle their own ports.
    fn create_ports(&self, meta: &PortMeta<'_>, id: NodeId) -> Vec<Port>;

    /// A control-flow Enter port fired
    fn on_enter_port(&self, bp: &mut Blueprint, token: NodeToken, port: usize) -> Result<(), FlowError> {
        let _ = (bp, token, port);
        Ok(())
    }

    /// An Output port is being read. Undeclared ports return `Value::None`,
    /// which readers turn into their default.
    fn port_value(&self, bp: &mut Blueprint, token: NodeToken, port: usize) -> Result<Value, FlowError> {
        let _ = (bp, token, port);
        Ok(Value::None)
    }

    /// The node joins a running graph
    fn on_initialize(&self, bp: &mut Blueprint, token: NodeToken) -> Result<(), FlowError> {
        let _ = (bp, token);
        Ok(())
    }

    /// The node leaves a running graph
    fn on_deinitialize(&self, bp: &mut Blueprint, token: NodeToken) {
        let _ = (bp, token);
    }

    /// Host tick, delivered only while subscribed to [`Subscription::Tick`]
    fn on_tick(&self, bp: &mut Blueprint, token: NodeToken, delta: f32) -> Result<(), FlowError> {
        let _ = (bp, token, delta);
        Ok(())
    }

    /// Host lifecycle event, delivered only while subscribed to it
    fn on_host_event(&self, bp: &mut Blueprint, token: NodeToken, event: HostEvent) -> Result<(), FlowError> {
        let _ = (bp, token, event);
        Ok(())
    }

    /// Ports of a linked node changed. Return true to have
    /// [`create_ports`](Self::create_ports) called again.
    fn on_links_changed(&self, meta: &PortMeta<'_>, id: NodeId) -> bool {
        let _ = (meta, id);
        false
    }

    /// Label jump source for an Exit port whose label comes from the node
    /// rather than the port
    fn linked_port(&self, port: usize) -> Option<&str> {
        let _ = port;
        None
    }

    /// Compound nodes return the graph they embed
    fn subgraph(&self) -> Option<&SubgraphRef> {
        None
    }
}
