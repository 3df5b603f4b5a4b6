// SPDX-License-Identifier: MIT OR Apache-2.0
//! Outer interface of an embeddable graph.

use super::links::ResolvedLinks;
use crate::diagnostic::{Diagnostics, Issue};
use crate::node::NodeId;
use crate::port::{signature, DataType, Port, PortDirection, PortFlags};
use crate::value::Value;
use indexmap::IndexMap;

/// One pin of a derived subgraph interface
#[derive(Debug, Clone, PartialEq)]
pub struct InterfacePort {
    /// Pin name
    pub name: String,
    /// Direction as seen from the compound node
    pub direction: PortDirection,
    /// Data type for data pins
    pub data_type: Option<DataType>,
    /// Default for an unconnected outer Input
    pub default: Option<Value>,
    /// Hash of (direction, type, name)
    pub signature: u32,
    /// Boundary stub ports collapsed onto this pin, first stub first
    pub stubs: Vec<(NodeId, usize)>,
}

impl InterfacePort {
    /// The port a compound node declares for this pin
    pub fn outer_port(&self) -> Port {
        let mut port = Port::untyped(self.name.clone(), self.direction);
        port.data_type = self.data_type.clone();
        if self.direction == PortDirection::Input {
            port.default_value = self.default.clone();
        }
        port
    }
}

/// Pins a graph exposes when embedded in a compound node
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubgraphInterface {
    /// Embedded graph name
    pub graph: String,
    /// Pins, in stub declaration order
    pub ports: Vec<InterfacePort>,
}

impl SubgraphInterface {
    /// Find a pin by signature
    pub fn port_by_signature(&self, signature: u32) -> Option<(usize, &InterfacePort)> {
        self.ports
            .iter()
            .enumerate()
            .find(|(_, p)| p.signature == signature)
    }

    /// Ports a compound node embedding this graph declares
    pub fn outer_ports(&self) -> Vec<Port> {
        self.ports.iter().map(InterfacePort::outer_port).collect()
    }
}

/// Derive the outer interface from the graph's `External` ports.
///
/// Stubs with no inner links are pruned. Stubs sharing a signature collapse
/// onto the first one.
pub(crate) fn derive_interface(
    graph: &str,
    ports: &IndexMap<NodeId, Vec<Port>>,
    links: &ResolvedLinks,
    diagnostics: &mut Diagnostics,
) -> SubgraphInterface {
    let mut interface = SubgraphInterface {
        graph: graph.to_string(),
        ports: Vec::new(),
    };

    for (id, node_ports) in ports {
        for (index, port) in node_ports.iter().enumerate() {
            if !port.flags.contains(PortFlags::EXTERNAL) {
                continue;
            }
            if !links.is_live((*id, index), port.direction) {
                diagnostics.report(
                    graph,
                    Some(*id),
                    Issue::PrunedBoundary {
                        name: port.name.clone(),
                    },
                );
                continue;
            }

            let direction = port.direction.opposite();
            let signature = signature(direction, port.data_type.as_ref(), &port.name);
            if let Some(existing) = interface.ports.iter_mut().find(|p| p.signature == signature) {
                diagnostics.report(
                    graph,
                    Some(*id),
                    Issue::DuplicateBoundary {
                        name: port.name.clone(),
                    },
                );
                existing.stubs.push((*id, index));
                continue;
            }

            interface.ports.push(InterfacePort {
                name: port.name.clone(),
                direction,
                data_type: port.data_type.clone(),
                default: port.default_value.clone(),
                signature,
                stubs: vec![(*id, index)],
            });
        }
    }

    interface
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub(name: &str, direction: PortDirection) -> Port {
        Port::untyped(name, direction).with_flags(PortFlags::EXTERNAL)
    }

    #[test]
    fn test_unlinked_stub_is_pruned() {
        let go = NodeId::new();
        let orphan = NodeId::new();
        let target = NodeId::new();

        let mut ports = IndexMap::new();
        ports.insert(go, vec![stub("Go", PortDirection::Exit)]);
        ports.insert(orphan, vec![stub("Orphan", PortDirection::Exit)]);
        ports.insert(target, vec![Port::enter("In")]);

        let mut links = ResolvedLinks::default();
        links.exits.insert((go, 0), vec![(target, 0)]);

        let mut diagnostics = Diagnostics::new();
        let interface = derive_interface("inner", &ports, &links, &mut diagnostics);

        assert_eq!(interface.ports.len(), 1);
        assert_eq!(interface.ports[0].name, "Go");
        assert_eq!(interface.ports[0].direction, PortDirection::Enter);
        assert!(diagnostics
            .iter()
            .any(|d| matches!(&d.issue, Issue::PrunedBoundary { name } if name == "Orphan")));
    }

    #[test]
    fn test_equal_signatures_collapse() {
        let first = NodeId::new();
        let second = NodeId::new();
        let source = NodeId::new();

        let mut ports = IndexMap::new();
        ports.insert(first, vec![stub("Done", PortDirection::Enter)]);
        ports.insert(second, vec![stub("Done", PortDirection::Enter)]);
        ports.insert(source, vec![Port::exit("A"), Port::exit("B")]);

        let mut links = ResolvedLinks::default();
        links.exits.insert((source, 0), vec![(first, 0)]);
        links.exits.insert((source, 1), vec![(second, 0)]);

        let mut diagnostics = Diagnostics::new();
        let interface = derive_interface("inner", &ports, &links, &mut diagnostics);

        assert_eq!(interface.ports.len(), 1);
        assert_eq!(interface.ports[0].stubs, vec![(first, 0), (second, 0)]);
        assert_eq!(interface.outer_ports()[0].direction, PortDirection::Exit);
        assert_eq!(diagnostics.len(), 1);
    }
}
