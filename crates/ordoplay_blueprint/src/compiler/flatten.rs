// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subgraph flattening and address compaction.
//!
//! Every flattened compound node gets its own scope holding a fresh copy of
//! the embedded graph's nodes. Links that pass through a compound port or a
//! boundary stub are then followed until they reach a real node, after which
//! compound and stub nodes are dropped and the rest renumbered.

use super::{LinkedGraph, LinkedNode};
use crate::compiled::{
    BoundaryPort, CompiledGraph, CompiledNode, CompiledPort, DataSource, PortAddress, Scope, ScopeId,
    Wiring,
};
use crate::diagnostic::{Diagnostics, Issue};
use crate::node::NodeId;
use crate::port::{signature, Port, PortDirection};
use crate::types::TypeRegistry;
use crate::value::Value;
use std::collections::HashMap;

/// (flat node index, port index) before compaction
type FlatPort = (usize, usize);

enum Role {
    Real,
    /// Flattened compound node; per port, the inner stub ports behind it
    Compound(Vec<Vec<FlatPort>>),
    /// Boundary stub inside an embedded scope; stub port -> compound port
    Stub(HashMap<usize, FlatPort>),
}

struct FlatNode<'g> {
    id: NodeId,
    scope: ScopeId,
    linked: &'g LinkedNode,
    role: Role,
    /// Per port: Exit fan-out within the scope
    targets: Vec<Vec<FlatPort>>,
    /// Per port: Input source within the scope
    sources: Vec<Option<FlatPort>>,
}

enum FlatSource {
    Port(FlatPort),
    Constant(Value),
    Default,
}

#[derive(Default)]
struct Flattener<'g> {
    nodes: Vec<FlatNode<'g>>,
    scopes: Vec<Scope>,
}

/// Flatten a linked root graph into its compiled form
pub(crate) fn flatten(root: &LinkedGraph, types: &TypeRegistry, diagnostics: &mut Diagnostics) -> CompiledGraph {
    let mut flattener = Flattener::default();
    let root_local = flattener.instantiate(root, None);

    let mut remap = vec![None; flattener.nodes.len()];
    let mut next = 0;
    for (index, node) in flattener.nodes.iter().enumerate() {
        if matches!(node.role, Role::Real) {
            remap[index] = Some(next);
            next += 1;
        }
    }
    let address = |(node, port): FlatPort| remap[node].map(|node| PortAddress::new(node, port));

    let mut compiled = Vec::with_capacity(next);
    for (index, node) in flattener.nodes.iter().enumerate() {
        if !matches!(node.role, Role::Real) {
            continue;
        }

        let ports = node
            .linked
            .ports
            .iter()
            .enumerate()
            .map(|(port_index, port)| {
                let wiring = match port.direction {
                    PortDirection::Exit => {
                        let mut reached = Vec::new();
                        flattener.expand_targets(
                            &node.targets[port_index],
                            &mut Vec::new(),
                            &mut reached,
                            diagnostics,
                        );
                        let targets: Box<[PortAddress]> = reached.into_iter().filter_map(address).collect();
                        if targets.is_empty() {
                            Wiring::None
                        } else {
                            Wiring::Targets(targets)
                        }
                    }
                    PortDirection::Input => {
                        let source = match flattener.expand_source((index, port_index), &mut Vec::new(), diagnostics) {
                            FlatSource::Port(output) => address(output).map_or(DataSource::Default, DataSource::Port),
                            FlatSource::Constant(value) => DataSource::Constant(value),
                            FlatSource::Default => DataSource::Default,
                        };
                        Wiring::Source(source)
                    }
                    PortDirection::Enter | PortDirection::Output => Wiring::None,
                };
                CompiledPort {
                    port: port.clone(),
                    default: port_default(port, types),
                    wiring,
                }
            })
            .collect();

        compiled.push(CompiledNode {
            id: node.id,
            scope: node.scope,
            node_type: node.linked.node_type.clone(),
            ports,
            behavior: node.linked.behavior.clone(),
        });
    }

    let boundary = root
        .interface
        .ports
        .iter()
        .map(|pin| BoundaryPort {
            name: pin.name.clone(),
            direction: pin.direction,
            data_type: pin.data_type.clone(),
            signature: pin.signature,
            stubs: pin
                .stubs
                .iter()
                .filter_map(|(id, port)| root_local.get(id).and_then(|node| address((*node, *port))))
                .collect(),
        })
        .collect();

    tracing::debug!(
        "Flattened {:?}: {} scopes, {} indirection nodes removed",
        root.name,
        flattener.scopes.len(),
        flattener.nodes.len() - compiled.len()
    );

    CompiledGraph::new(root.name.clone(), compiled, flattener.scopes, boundary)
}

/// Value an unconnected data port reads
fn port_default(port: &Port, types: &TypeRegistry) -> Value {
    if port.direction.is_control() {
        return Value::None;
    }
    match (&port.default_value, &port.data_type) {
        (Some(value), _) if !value.is_none() => value.clone(),
        (_, Some(data_type)) => types.default_value(data_type),
        _ => Value::None,
    }
}

impl<'g> Flattener<'g> {
    /// Copy a linked graph into a new scope, recursing into flattened
    /// compounds. Returns the flat index of every node in the scope.
    fn instantiate(&mut self, graph: &'g LinkedGraph, compound: Option<usize>) -> HashMap<NodeId, usize> {
        let scope = self.scopes.len();
        self.scopes.push(Scope {
            parent: compound.map(|c| self.nodes[c].scope),
            node: compound.map(|c| self.nodes[c].id),
            graph: graph.name.clone(),
        });

        let mut local = HashMap::new();
        for (id, node) in &graph.nodes {
            local.insert(*id, self.nodes.len());
            let role = if node.inner.is_some() {
                Role::Compound(Vec::new())
            } else if scope != 0 && node.ports.iter().any(Port::is_external) {
                Role::Stub(HashMap::new())
            } else {
                Role::Real
            };
            self.nodes.push(FlatNode {
                id: *id,
                scope,
                linked: node,
                role,
                targets: vec![Vec::new(); node.ports.len()],
                sources: vec![None; node.ports.len()],
            });
        }

        for ((from_node, from_port), targets) in &graph.links.exits {
            let Some(&from) = local.get(from_node) else {
                continue;
            };
            self.nodes[from].targets[*from_port] = targets
                .iter()
                .filter_map(|(node, port)| local.get(node).map(|index| (*index, *port)))
                .collect();
        }
        for ((to_node, to_port), (from_node, from_port)) in &graph.links.sources {
            if let (Some(&to), Some(&from)) = (local.get(to_node), local.get(from_node)) {
                self.nodes[to].sources[*to_port] = Some((from, *from_port));
            }
        }

        for (id, node) in &graph.nodes {
            let (Some(inner), Some(&compound)) = (node.inner.as_deref(), local.get(id)) else {
                continue;
            };
            let inner_local = self.instantiate(inner, Some(compound));

            let mut forwards = Vec::with_capacity(node.ports.len());
            for (index, port) in node.ports.iter().enumerate() {
                let signature = signature(port.direction, port.data_type.as_ref(), &port.name);
                let stubs: Vec<FlatPort> = inner
                    .interface
                    .port_by_signature(signature)
                    .map(|(_, pin)| {
                        pin.stubs
                            .iter()
                            .filter_map(|(stub, stub_port)| inner_local.get(stub).map(|i| (*i, *stub_port)))
                            .collect()
                    })
                    .unwrap_or_default();
                for &(stub, stub_port) in &stubs {
                    if let Role::Stub(outer) = &mut self.nodes[stub].role {
                        outer.insert(stub_port, (compound, index));
                    }
                }
                forwards.push(stubs);
            }
            self.nodes[compound].role = Role::Compound(forwards);
        }

        local
    }

    fn report_cycle(&self, (node, port): FlatPort, diagnostics: &mut Diagnostics) {
        let node = &self.nodes[node];
        let name = node.linked.ports.get(port).map(|p| p.name.clone()).unwrap_or_default();
        diagnostics.report(
            &self.scopes[node.scope].graph,
            Some(node.id),
            Issue::ForwardingCycle { port: name },
        );
    }

    /// Follow Enter targets through compound and stub ports down to real nodes
    fn expand_targets(
        &self,
        targets: &[FlatPort],
        visiting: &mut Vec<FlatPort>,
        reached: &mut Vec<FlatPort>,
        diagnostics: &mut Diagnostics,
    ) {
        for &target in targets {
            match &self.nodes[target.0].role {
                Role::Real => {
                    if !reached.contains(&target) {
                        reached.push(target);
                    }
                }
                Role::Compound(forwards) => {
                    for &stub in forwards.get(target.1).map(Vec::as_slice).unwrap_or(&[]) {
                        self.forward_targets(stub, visiting, reached, diagnostics);
                    }
                }
                Role::Stub(outer) => {
                    if let Some(&compound_port) = outer.get(&target.1) {
                        self.forward_targets(compound_port, visiting, reached, diagnostics);
                    }
                }
            }
        }
    }

    /// Continue expansion from the fan-out of an indirection port
    fn forward_targets(
        &self,
        through: FlatPort,
        visiting: &mut Vec<FlatPort>,
        reached: &mut Vec<FlatPort>,
        diagnostics: &mut Diagnostics,
    ) {
        if visiting.contains(&through) {
            self.report_cycle(through, diagnostics);
            return;
        }
        visiting.push(through);
        let next = &self.nodes[through.0].targets[through.1];
        self.expand_targets(next, visiting, reached, diagnostics);
        visiting.pop();
    }

    /// Follow an Input's source through compound and stub ports
    fn expand_source(
        &self,
        input: FlatPort,
        visiting: &mut Vec<FlatPort>,
        diagnostics: &mut Diagnostics,
    ) -> FlatSource {
        match self.nodes[input.0].sources.get(input.1).copied().flatten() {
            Some(output) => self.resolve_output(output, visiting, diagnostics),
            None => FlatSource::Default,
        }
    }

    fn resolve_output(
        &self,
        output: FlatPort,
        visiting: &mut Vec<FlatPort>,
        diagnostics: &mut Diagnostics,
    ) -> FlatSource {
        let node = &self.nodes[output.0];
        match &node.role {
            Role::Real => FlatSource::Port(output),
            Role::Compound(forwards) => match forwards.get(output.1).and_then(|stubs| stubs.first()) {
                Some(&stub) => self.forward_source(stub, visiting, diagnostics),
                None => FlatSource::Default,
            },
            Role::Stub(outer) => {
                let Some(&compound_input) = outer.get(&output.1) else {
                    return constant_or_default(node.linked.ports.get(output.1));
                };
                match self.forward_source(compound_input, visiting, diagnostics) {
                    FlatSource::Default => {
                        let (compound, port) = compound_input;
                        constant_or_default(self.nodes[compound].linked.ports.get(port))
                    }
                    source => source,
                }
            }
        }
    }

    fn forward_source(
        &self,
        input: FlatPort,
        visiting: &mut Vec<FlatPort>,
        diagnostics: &mut Diagnostics,
    ) -> FlatSource {
        if visiting.contains(&input) {
            self.report_cycle(input, diagnostics);
            return FlatSource::Default;
        }
        visiting.push(input);
        let source = self.expand_source(input, visiting, diagnostics);
        visiting.pop();
        source
    }
}

/// An unconnected compound input reads its own default
fn constant_or_default(port: Option<&Port>) -> FlatSource {
    match port.and_then(|p| p.default_value.as_ref()) {
        Some(value) if !value.is_none() => FlatSource::Constant(value.clone()),
        _ => FlatSource::Default,
    }
}
