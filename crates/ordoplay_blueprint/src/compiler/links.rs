// SPDX-License-Identifier: MIT OR Apache-2.0
//! Explicit and label link resolution.

use crate::behavior::NodeBehavior;
use crate::connection::{LinkId, PortRef};
use crate::diagnostic::{Diagnostics, Issue};
use crate::graph::Graph;
use crate::node::NodeId;
use crate::port::{label_hash, Port, PortDirection};
use crate::types::TypeRegistry;
use indexmap::IndexMap;
use std::sync::Arc;

/// A port identified by node and index
pub(crate) type PortKey = (NodeId, usize);

/// An authored link that passed validation, with its ports re-resolved
#[derive(Debug, Clone)]
pub(crate) struct AcceptedLink {
    pub id: LinkId,
    pub from: PortRef,
    pub to: PortRef,
}

/// Links of one graph after validation
#[derive(Debug, Default)]
pub(crate) struct ResolvedLinks {
    /// Exit port -> Enter ports, in declaration order
    pub exits: IndexMap<PortKey, Vec<PortKey>>,
    /// Input port -> Output port
    pub sources: IndexMap<PortKey, PortKey>,
    /// Authored links that survived
    pub accepted: Vec<AcceptedLink>,
}

impl ResolvedLinks {
    /// Whether anything links into or out of a port
    pub fn is_live(&self, key: PortKey, direction: PortDirection) -> bool {
        match direction {
            PortDirection::Exit => self.exits.get(&key).is_some_and(|t| !t.is_empty()),
            PortDirection::Enter => self.exits.values().any(|t| t.contains(&key)),
            PortDirection::Input => self.sources.contains_key(&key),
            PortDirection::Output => self.sources.values().any(|s| *s == key),
        }
    }
}

/// Find the current index of a linked port, following a rename-free move
fn resolve_port(ports: &[Port], port_ref: &PortRef) -> Result<(usize, Option<Issue>), Issue> {
    if let Some(port) = ports.get(port_ref.index) {
        if port_ref.name.is_empty() || port.name == port_ref.name {
            return Ok((port_ref.index, None));
        }
    }

    if !port_ref.name.is_empty() {
        if let Some(index) = ports.iter().position(|p| p.name == port_ref.name) {
            let moved = Issue::PortMoved {
                name: port_ref.name.clone(),
                from: port_ref.index,
                to: index,
            };
            return Ok((index, Some(moved)));
        }
    }

    Err(Issue::MissingPort {
        index: port_ref.index,
        name: port_ref.name.clone(),
    })
}

/// Validate every authored link against the materialized ports.
///
/// Invalid links are reported and dropped; the first source of a data input
/// wins.
pub(crate) fn resolve_explicit(
    graph: &Graph,
    ports: &IndexMap<NodeId, Vec<Port>>,
    types: &TypeRegistry,
    diagnostics: &mut Diagnostics,
) -> ResolvedLinks {
    let mut resolved = ResolvedLinks::default();

    for link in graph.links() {
        let mut ends = Vec::with_capacity(2);
        for port_ref in [&link.from, &link.to] {
            let Some(node_ports) = ports.get(&port_ref.node) else {
                diagnostics.report(&graph.name, Some(port_ref.node), Issue::MissingNode(port_ref.node));
                break;
            };
            match resolve_port(node_ports, port_ref) {
                Ok((index, moved)) => {
                    if let Some(issue) = moved {
                        diagnostics.report(&graph.name, Some(port_ref.node), issue);
                    }
                    ends.push((port_ref.node, index, &node_ports[index]));
                }
                Err(issue) => {
                    diagnostics.report(&graph.name, Some(port_ref.node), issue);
                    break;
                }
            }
        }
        let [a, b] = ends.as_slice() else {
            continue;
        };

        // Accept links authored target-first
        let (from, to) = if a.2.direction.is_source() { (a, b) } else { (b, a) };
        let (from_node, from_index, from_port) = *from;
        let (to_node, to_index, to_port) = *to;

        if !from_port.can_link_to(to_port) {
            diagnostics.report(
                &graph.name,
                Some(to_node),
                Issue::IncompatibleDirection {
                    from: from_port.direction.as_str(),
                    from_port: from_port.name.clone(),
                    to: to_port.direction.as_str(),
                    to_port: to_port.name.clone(),
                },
            );
            continue;
        }

        let from_key = (from_node, from_index);
        let to_key = (to_node, to_index);
        if to_port.direction == PortDirection::Input {
            if let (Some(output), Some(input)) = (&from_port.data_type, &to_port.data_type) {
                if !types.accepts(input, output) {
                    diagnostics.report(
                        &graph.name,
                        Some(to_node),
                        Issue::IncompatibleTypes {
                            input_port: to_port.name.clone(),
                            input: input.clone(),
                            output: output.clone(),
                        },
                    );
                    continue;
                }
            }
            if resolved.sources.contains_key(&to_key) {
                diagnostics.report(
                    &graph.name,
                    Some(to_node),
                    Issue::DuplicateSource {
                        port: to_port.name.clone(),
                    },
                );
                continue;
            }
            resolved.sources.insert(to_key, from_key);
        } else {
            let targets = resolved.exits.entry(from_key).or_default();
            if !targets.contains(&to_key) {
                targets.push(to_key);
            }
        }

        resolved.accepted.push(AcceptedLink {
            id: link.id,
            from: PortRef::named(from_node, from_index, from_port.name.clone()),
            to: PortRef::named(to_node, to_index, to_port.name.clone()),
        });
    }

    resolved
}

/// Synthesize links from Exit labels to Enter ports with an equal label.
///
/// The empty label (hash 0) jumps to the first Enter port carrying the empty
/// label, the graph's default entry.
pub(crate) fn resolve_labels(
    graph: &Graph,
    ports: &IndexMap<NodeId, Vec<Port>>,
    behaviors: &IndexMap<NodeId, Arc<dyn NodeBehavior>>,
    resolved: &mut ResolvedLinks,
    diagnostics: &mut Diagnostics,
) {
    let mut entries: Vec<(u32, PortKey)> = Vec::new();
    for (id, node_ports) in ports {
        for (index, port) in node_ports.iter().enumerate() {
            if port.direction == PortDirection::Enter {
                if let Some(label) = &port.label {
                    entries.push((label_hash(label), (*id, index)));
                }
            }
        }
    }

    let defaults = entries.iter().filter(|(hash, _)| *hash == 0).count();
    if defaults > 1 {
        diagnostics.report(&graph.name, None, Issue::AmbiguousDefaultEntry(defaults));
    }
    let default_entry = entries.iter().find(|(hash, _)| *hash == 0).map(|(_, key)| *key);

    for (id, node_ports) in ports {
        for (index, port) in node_ports.iter().enumerate() {
            if port.direction != PortDirection::Exit {
                continue;
            }
            let label = port
                .label
                .as_deref()
                .or_else(|| behaviors.get(id).and_then(|b| b.linked_port(index)));
            let Some(label) = label else {
                continue;
            };

            let hash = label_hash(label);
            let targets: Vec<PortKey> = if hash == 0 {
                default_entry.into_iter().collect()
            } else {
                entries
                    .iter()
                    .filter(|(h, _)| *h == hash)
                    .map(|(_, key)| *key)
                    .collect()
            };

            if targets.is_empty() {
                diagnostics.report(&graph.name, Some(*id), Issue::DanglingLabel(label.to_string()));
                continue;
            }

            let fan_out = resolved.exits.entry((*id, index)).or_default();
            for target in targets {
                if !fan_out.contains(&target) {
                    fan_out.push(target);
                }
            }
        }
    }
}
