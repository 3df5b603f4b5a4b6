// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph compiler.
//!
//! Turns an authored [`Graph`], plus the subgraph assets it embeds, into one
//! [`CompiledGraph`]. Each asset is linked once per compile:
//!
//! 1. behaviors are built from the node registry,
//! 2. ports are materialized until they settle,
//! 3. explicit links are validated and label links synthesized,
//! 4. the asset's boundary interface is derived.
//!
//! The linked assets are then instantiated into scopes, indirection through
//! compound and boundary nodes is expanded away, and the surviving nodes are
//! compacted into the final array.

mod flatten;
mod links;
mod ports;
mod subgraph;

#[cfg(test)]
mod tests;

pub use subgraph::{InterfacePort, SubgraphInterface};

use crate::behavior::{NodeBehavior, SubgraphMode};
use crate::compiled::CompiledGraph;
use crate::diagnostic::{Diagnostics, Issue};
use crate::graph::{Graph, GraphLibrary};
use crate::node::{NodeConfig, NodeId, NodeRegistry};
use crate::port::Port;
use crate::types::TypeRegistry;
use indexmap::IndexMap;
use links::{AcceptedLink, ResolvedLinks};
use ports::Materializer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Compiler tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Port materialization passes before unsettled nodes are rejected
    pub max_port_passes: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { max_port_passes: 16 }
    }
}

/// Result of a compile: always a runnable graph, plus everything that was
/// dropped along the way
#[derive(Debug, Clone)]
pub struct Compilation {
    /// The compiled graph
    pub graph: Arc<CompiledGraph>,
    /// Problems found while compiling
    pub diagnostics: Diagnostics,
}

/// A node that survived linking
pub(crate) struct LinkedNode {
    pub node_type: String,
    pub behavior: Arc<dyn NodeBehavior>,
    pub ports: Vec<Port>,
    /// Embedded graph for flattened compound nodes
    pub inner: Option<Arc<LinkedGraph>>,
}

/// One graph asset after linking, before instantiation
pub(crate) struct LinkedGraph {
    pub name: String,
    pub nodes: IndexMap<NodeId, LinkedNode>,
    pub links: ResolvedLinks,
    pub interface: Arc<SubgraphInterface>,
}

/// Compiles authored graphs against a node and type registry
pub struct Compiler<'a> {
    nodes: &'a NodeRegistry,
    types: &'a TypeRegistry,
    library: Option<&'a GraphLibrary>,
    options: CompileOptions,
}

impl<'a> Compiler<'a> {
    /// Create a compiler
    pub fn new(nodes: &'a NodeRegistry, types: &'a TypeRegistry) -> Self {
        Self {
            nodes,
            types,
            library: None,
            options: CompileOptions::default(),
        }
    }

    /// Resolve subgraph references against a library
    pub fn with_library(mut self, library: &'a GraphLibrary) -> Self {
        self.library = Some(library);
        self
    }

    /// Set the compile options
    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Compile a graph. Never fails; whatever could not be compiled is
    /// reported in the returned diagnostics.
    pub fn compile(&self, graph: &Graph) -> Compilation {
        let mut session = Session::new(self);
        let linked = Arc::new(session.link_root(graph));
        let compiled = flatten::flatten(&linked, self.types, &mut session.diagnostics);

        tracing::info!(
            "Compiled blueprint {:?}: {} nodes, {} links, {} diagnostics",
            compiled.name(),
            compiled.len(),
            compiled.link_count(),
            session.diagnostics.len()
        );

        Compilation {
            graph: Arc::new(compiled),
            diagnostics: session.diagnostics,
        }
    }

    /// Recompute every node's cached ports and drop links that no longer
    /// validate. Links whose ports moved are re-pointed.
    pub fn refresh(&self, graph: &mut Graph) -> Diagnostics {
        let mut session = Session::new(self);
        let linked = session.link_root(graph);

        let ids: Vec<NodeId> = graph.node_ids().collect();
        for id in ids {
            if let (Some(node), Some(linked_node)) = (graph.node_mut(id), linked.nodes.get(&id)) {
                node.ports = linked_node.ports.clone();
            }
        }

        let accepted: HashMap<_, &AcceptedLink> = linked
            .links
            .accepted
            .iter()
            .map(|link| (link.id, link))
            .collect();
        graph.retain_links(|link| match accepted.get(&link.id) {
            Some(resolved) => {
                link.from = resolved.from.clone();
                link.to = resolved.to.clone();
                true
            }
            None => false,
        });

        session.diagnostics
    }

    /// Replace a node's configuration, then refresh the graph so its ports
    /// are rebuilt and its links re-validated
    pub fn reconfigure(&self, graph: &mut Graph, id: NodeId, config: NodeConfig) -> Diagnostics {
        if !graph.set_config(id, config) {
            let mut diagnostics = Diagnostics::new();
            diagnostics.report(&graph.name, Some(id), Issue::MissingNode(id));
            return diagnostics;
        }
        self.refresh(graph)
    }
}

/// State shared while linking one root graph and everything it embeds
struct Session<'c> {
    compiler: &'c Compiler<'c>,
    linked: HashMap<String, Arc<LinkedGraph>>,
    interfaces: HashMap<String, Arc<SubgraphInterface>>,
    stack: Vec<String>,
    diagnostics: Diagnostics,
}

impl<'c> Session<'c> {
    fn new(compiler: &'c Compiler<'c>) -> Self {
        Self {
            compiler,
            linked: HashMap::new(),
            interfaces: HashMap::new(),
            stack: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    fn link_root(&mut self, graph: &Graph) -> LinkedGraph {
        self.stack.push(graph.name.clone());
        let linked = self.link(graph);
        self.stack.pop();
        linked
    }

    /// Link a library asset, reusing an earlier result
    fn link_asset(&mut self, name: &str) -> Result<Arc<LinkedGraph>, Issue> {
        if self.stack.iter().any(|entry| entry == name) {
            return Err(Issue::RecursiveSubgraph(name.to_string()));
        }
        if let Some(linked) = self.linked.get(name) {
            return Ok(linked.clone());
        }
        let library = self.compiler.library;
        let graph = library
            .and_then(|library| library.get(name))
            .ok_or_else(|| Issue::MissingSubgraph(name.to_string()))?;

        self.stack.push(name.to_string());
        let linked = Arc::new(self.link(graph));
        self.stack.pop();

        self.interfaces.insert(name.to_string(), linked.interface.clone());
        self.linked.insert(name.to_string(), linked.clone());
        Ok(linked)
    }

    fn link(&mut self, graph: &Graph) -> LinkedGraph {
        tracing::debug!("Linking graph {:?}", graph.name);

        let mut behaviors: IndexMap<NodeId, Arc<dyn NodeBehavior>> = IndexMap::new();
        let mut inner: HashMap<NodeId, Arc<LinkedGraph>> = HashMap::new();
        for node in graph.nodes() {
            let Some(node_type) = self.compiler.nodes.get(&node.node_type) else {
                self.diagnostics.report(
                    &graph.name,
                    Some(node.id),
                    Issue::UnknownNodeType(node.node_type.clone()),
                );
                continue;
            };
            let behavior = match node_type.instantiate(&node.config) {
                Ok(behavior) => behavior,
                Err(err) => {
                    self.diagnostics.report(&graph.name, Some(node.id), Issue::InvalidConfig(err));
                    continue;
                }
            };

            if let Some(subgraph) = behavior.subgraph() {
                match self.link_asset(&subgraph.graph) {
                    Ok(linked) => {
                        if subgraph.mode == SubgraphMode::Flatten {
                            inner.insert(node.id, linked);
                        }
                    }
                    Err(issue) => {
                        self.diagnostics.report(&graph.name, Some(node.id), issue);
                        continue;
                    }
                }
            }
            behaviors.insert(node.id, behavior);
        }

        let ports = Materializer {
            graph,
            behaviors: &behaviors,
            types: self.compiler.types,
            interfaces: &self.interfaces,
            max_passes: self.compiler.options.max_port_passes,
        }
        .run(&mut self.diagnostics);
        behaviors.retain(|id, _| ports.contains_key(id));

        let mut links = links::resolve_explicit(graph, &ports, self.compiler.types, &mut self.diagnostics);
        links::resolve_labels(graph, &ports, &behaviors, &mut links, &mut self.diagnostics);
        let interface = subgraph::derive_interface(&graph.name, &ports, &links, &mut self.diagnostics);

        let mut nodes = IndexMap::new();
        for (id, node_ports) in ports {
            let (Some(node), Some(behavior)) = (graph.node(id), behaviors.get(&id)) else {
                continue;
            };
            nodes.insert(
                id,
                LinkedNode {
                    node_type: node.node_type.clone(),
                    behavior: behavior.clone(),
                    ports: node_ports,
                    inner: inner.remove(&id),
                },
            );
        }

        LinkedGraph {
            name: graph.name.clone(),
            nodes,
            links,
            interface: Arc::new(interface),
        }
    }
}
