// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port materialization.
//!
//! Nodes may shape their ports after whatever is linked to them, so
//! `create_ports` runs in passes until no node's port table changes.

use super::SubgraphInterface;
use crate::behavior::{NodeBehavior, PortMeta};
use crate::diagnostic::{Diagnostics, Issue};
use crate::graph::Graph;
use crate::node::NodeId;
use crate::port::Port;
use crate::types::TypeRegistry;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::sync::Arc;

/// Inputs shared by every pass
pub(crate) struct Materializer<'a> {
    pub graph: &'a Graph,
    pub behaviors: &'a IndexMap<NodeId, Arc<dyn NodeBehavior>>,
    pub types: &'a TypeRegistry,
    pub interfaces: &'a HashMap<String, Arc<SubgraphInterface>>,
    pub max_passes: usize,
}

impl Materializer<'_> {
    /// Materialize every node's ports. Nodes whose ports never settle or
    /// fail schema checks are reported and left out of the result.
    pub fn run(&self, diagnostics: &mut Diagnostics) -> IndexMap<NodeId, Vec<Port>> {
        let mut ports: IndexMap<NodeId, Vec<Port>> = IndexMap::new();
        let mut dirty: IndexSet<NodeId> = self.behaviors.keys().copied().collect();
        let mut passes = 0;

        while !dirty.is_empty() {
            if passes == self.max_passes {
                for id in &dirty {
                    diagnostics.report(
                        &self.graph.name,
                        Some(*id),
                        Issue::PortsDidNotSettle { passes },
                    );
                    ports.shift_remove(id);
                }
                break;
            }
            passes += 1;

            let mut changed = Vec::new();
            for (id, behavior) in self.behaviors {
                if !dirty.contains(id) {
                    continue;
                }
                let new_ports = behavior.create_ports(&self.meta(&ports), *id);
                if ports.get(id) != Some(&new_ports) {
                    ports.insert(*id, new_ports);
                    changed.push(*id);
                }
            }

            dirty.clear();
            for id in changed {
                for link in self.graph.links_for_node(id) {
                    for neighbor in [link.from.node, link.to.node] {
                        if neighbor == id || dirty.contains(&neighbor) {
                            continue;
                        }
                        let Some(behavior) = self.behaviors.get(&neighbor) else {
                            continue;
                        };
                        if behavior.on_links_changed(&self.meta(&ports), neighbor) {
                            dirty.insert(neighbor);
                        }
                    }
                }
            }
        }

        tracing::trace!("Ports of {:?} settled after {} passes", self.graph.name, passes);
        self.check_schema(ports, diagnostics)
    }

    fn meta<'m>(&'m self, ports: &'m IndexMap<NodeId, Vec<Port>>) -> PortMeta<'m> {
        PortMeta {
            graph: self.graph,
            ports,
            types: self.types,
            interfaces: self.interfaces,
        }
    }

    fn check_schema(
        &self,
        ports: IndexMap<NodeId, Vec<Port>>,
        diagnostics: &mut Diagnostics,
    ) -> IndexMap<NodeId, Vec<Port>> {
        ports
            .into_iter()
            .filter(|(id, node_ports)| {
                for port in node_ports {
                    let issue = match &port.data_type {
                        None if port.direction.is_data() => Issue::UnresolvedPortType {
                            port: port.name.clone(),
                        },
                        Some(data_type) if !self.types.contains(data_type) => {
                            Issue::UnregisteredType {
                                port: port.name.clone(),
                                data_type: data_type.clone(),
                            }
                        }
                        _ => continue,
                    };
                    diagnostics.report(&self.graph.name, Some(*id), issue);
                    return false;
                }
                true
            })
            .collect()
    }
}
