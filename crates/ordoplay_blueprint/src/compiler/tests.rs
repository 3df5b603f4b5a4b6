// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;
use crate::compiled::{DataSource, PortAddress};
use crate::connection::PortRef;
use crate::diagnostic::Severity;
use crate::node::Node;
use crate::nodes::create_blueprint_registry;
use crate::port::{DataType, PortDirection};
use crate::value::Value;

fn string(s: &str) -> Value {
    Value::String(s.to_string())
}

fn boundary(direction: &str, name: &str) -> Node {
    Node::new("boundary")
        .with_config("direction", string(direction))
        .with_config("name", string(name))
}

fn subgraph(graph: &str) -> Node {
    Node::new("subgraph").with_config("graph", string(graph))
}

fn link(graph: &mut Graph, from: NodeId, from_port: usize, to: NodeId, to_port: usize) {
    graph.add_link(PortRef::new(from, from_port), PortRef::new(to, to_port));
}

fn compile(graph: &Graph) -> Compilation {
    compile_with(graph, &GraphLibrary::new())
}

fn compile_with(graph: &Graph, library: &GraphLibrary) -> Compilation {
    let registry = create_blueprint_registry();
    let types = TypeRegistry::new();
    Compiler::new(&registry, &types).with_library(library).compile(graph)
}

fn index_of(compiled: &CompiledGraph, id: NodeId) -> usize {
    compiled.find(id).next().expect("node compiled")
}

fn has_issue(diagnostics: &Diagnostics, check: impl Fn(&Issue) -> bool) -> bool {
    diagnostics.iter().any(|d| check(&d.issue))
}

/// Inner graph: Go -> print -> Done
fn go_done_graph() -> (Graph, NodeId) {
    let mut inner = Graph::new("inner");
    let go = inner.add_node(boundary("Enter", "Go"));
    let print = inner.add_node(Node::new("print_string"));
    let done = inner.add_node(boundary("Exit", "Done"));
    link(&mut inner, go, 0, print, 0);
    link(&mut inner, print, 1, done, 0);
    (inner, print)
}

#[test]
fn test_start_print_compiles() {
    let mut graph = Graph::new("main");
    let start = graph.add_node(Node::new("event_start"));
    let print = graph.add_node(Node::new("print_string"));
    link(&mut graph, start, 0, print, 0);

    let compilation = compile(&graph);
    assert!(compilation.diagnostics.is_empty(), "{}", compilation.diagnostics);

    let compiled = &compilation.graph;
    assert_eq!(compiled.len(), 2);
    assert_eq!(compiled.link_count(), 1);

    let print_index = index_of(compiled, print);
    let start_node = compiled.node(index_of(compiled, start)).unwrap();
    assert_eq!(start_node.ports[0].targets(), &[PortAddress::new(print_index, 0)]);

    let text = &compiled.node(print_index).unwrap().ports[2];
    assert_eq!(text.source(), &DataSource::Default);
    assert_eq!(text.default, string("hello"));
}

#[test]
fn test_incompatible_type_link_dropped() {
    let mut graph = Graph::new("main");
    let text = graph.add_node(Node::new("constant").with_config("value", string("x")));
    let add = graph.add_node(Node::new("add"));
    link(&mut graph, text, 0, add, 0);

    let compilation = compile(&graph);
    assert!(has_issue(&compilation.diagnostics, |i| matches!(
        i,
        Issue::IncompatibleTypes { input: DataType::Float, output: DataType::String, .. }
    )));
    assert!(!compilation.diagnostics.has_errors());
    assert_eq!(compilation.graph.len(), 2);
    assert_eq!(compilation.graph.link_count(), 0);
}

#[test]
fn test_widening_link_accepted() {
    let mut graph = Graph::new("main");
    let int = graph.add_node(Node::new("constant").with_config("value", Value::Int(3)));
    let add = graph.add_node(Node::new("add"));
    link(&mut graph, int, 0, add, 0);

    let compilation = compile(&graph);
    assert!(compilation.diagnostics.is_empty(), "{}", compilation.diagnostics);
    assert_eq!(compilation.graph.link_count(), 1);
}

#[test]
fn test_direction_mismatch_dropped() {
    let mut graph = Graph::new("main");
    let start = graph.add_node(Node::new("event_start"));
    let add = graph.add_node(Node::new("add"));
    link(&mut graph, start, 0, add, 0);

    let compilation = compile(&graph);
    assert!(has_issue(&compilation.diagnostics, |i| matches!(i, Issue::IncompatibleDirection { .. })));
    assert_eq!(compilation.graph.link_count(), 0);
}

#[test]
fn test_target_first_link_is_normalized() {
    let mut graph = Graph::new("main");
    let start = graph.add_node(Node::new("event_start"));
    let print = graph.add_node(Node::new("print_string"));
    link(&mut graph, print, 0, start, 0);

    let compilation = compile(&graph);
    assert!(compilation.diagnostics.is_empty(), "{}", compilation.diagnostics);
    let compiled = &compilation.graph;
    let start_node = compiled.node(index_of(compiled, start)).unwrap();
    assert_eq!(start_node.ports[0].targets().len(), 1);
}

#[test]
fn test_first_data_source_wins() {
    let mut graph = Graph::new("main");
    let first = graph.add_node(Node::new("constant").with_config("value", string("first")));
    let second = graph.add_node(Node::new("constant").with_config("value", string("second")));
    let print = graph.add_node(Node::new("print_string"));
    link(&mut graph, first, 0, print, 2);
    link(&mut graph, second, 0, print, 2);

    let compilation = compile(&graph);
    assert!(has_issue(&compilation.diagnostics, |i| matches!(i, Issue::DuplicateSource { .. })));

    let compiled = &compilation.graph;
    let text = &compiled.node(index_of(compiled, print)).unwrap().ports[2];
    assert_eq!(
        text.source(),
        &DataSource::Port(PortAddress::new(index_of(compiled, first), 0))
    );
}

#[test]
fn test_bad_nodes_excluded() {
    let mut graph = Graph::new("main");
    let unknown = graph.add_node(Node::new("teleport"));
    let sequence = graph.add_node(Node::new("sequence").with_config("count", Value::Int(0)));
    let start = graph.add_node(Node::new("event_start"));
    link(&mut graph, start, 0, sequence, 0);

    let compilation = compile(&graph);
    let errors: Vec<_> = compilation.diagnostics.errors().collect();
    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0].issue, Issue::UnknownNodeType(_)));
    assert_eq!(errors[0].node, Some(unknown));
    assert!(matches!(errors[1].issue, Issue::InvalidConfig(_)));

    // The link into the excluded node is dropped, the rest compiles
    assert!(has_issue(&compilation.diagnostics, |i| *i == Issue::MissingNode(sequence)));
    assert_eq!(compilation.graph.len(), 1);
}

#[test]
fn test_unregistered_type_is_schema_error() {
    let mut graph = Graph::new("main");
    graph.add_node(
        Node::new("constant")
            .with_config("value", Value::Handle(7))
            .with_config("type", string("Entity")),
    );

    let compilation = compile(&graph);
    assert!(has_issue(&compilation.diagnostics, |i| matches!(i, Issue::UnregisteredType { .. })));
    assert!(compilation.graph.is_empty());

    let registry = create_blueprint_registry();
    let mut types = TypeRegistry::new();
    types.register("Entity", Value::Handle(0), None);
    let compilation = Compiler::new(&registry, &types).compile(&graph);
    assert!(compilation.diagnostics.is_empty());
    assert_eq!(compilation.graph.len(), 1);
}

#[test]
fn test_label_links() {
    let mut graph = Graph::new("main");
    let goto = graph.add_node(Node::new("goto").with_config("label", string("L")));
    let label = graph.add_node(Node::new("label").with_config("label", string("L")));
    let other = graph.add_node(Node::new("label").with_config("label", string("M")));

    let compilation = compile(&graph);
    assert!(compilation.diagnostics.is_empty(), "{}", compilation.diagnostics);

    let compiled = &compilation.graph;
    let jump = &compiled.node(index_of(compiled, goto)).unwrap().ports[1];
    assert_eq!(jump.targets(), &[PortAddress::new(index_of(compiled, label), 0)]);
    assert!(compiled.find(other).next().is_some());
}

#[test]
fn test_empty_label_jumps_to_default_entry() {
    let mut graph = Graph::new("main");
    let goto = graph.add_node(Node::new("goto"));
    let first = graph.add_node(Node::new("label"));
    graph.add_node(Node::new("label"));

    let compilation = compile(&graph);
    assert!(has_issue(&compilation.diagnostics, |i| *i == Issue::AmbiguousDefaultEntry(2)));

    let compiled = &compilation.graph;
    let jump = &compiled.node(index_of(compiled, goto)).unwrap().ports[1];
    assert_eq!(jump.targets(), &[PortAddress::new(index_of(compiled, first), 0)]);
}

#[test]
fn test_dangling_label_reported() {
    let mut graph = Graph::new("main");
    graph.add_node(Node::new("goto").with_config("label", string("nowhere")));

    let compilation = compile(&graph);
    let diagnostic = compilation.diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.issue, Issue::DanglingLabel("nowhere".to_string()));
    assert_eq!(diagnostic.severity, Severity::Warning);
}

#[test]
fn test_subgraph_flattening_removes_indirection() {
    let (inner, inner_print) = go_done_graph();
    let library = GraphLibrary::new().with(inner);

    let mut outer = Graph::new("outer");
    let start = outer.add_node(Node::new("event_start"));
    let sub = outer.add_node(subgraph("inner"));
    let after = outer.add_node(Node::new("print_string"));
    link(&mut outer, start, 0, sub, 0);
    link(&mut outer, sub, 1, after, 0);

    let compilation = compile_with(&outer, &library);
    assert!(compilation.diagnostics.is_empty(), "{}", compilation.diagnostics);

    let compiled = &compilation.graph;
    assert_eq!(compiled.len(), 3);
    assert!(compiled.nodes().iter().all(|n| n.node_type != "boundary" && n.node_type != "subgraph"));
    assert_eq!(compiled.scopes().len(), 2);
    assert_eq!(compiled.scopes()[1].node, Some(sub));

    let print_index = index_of(compiled, inner_print);
    assert_eq!(compiled.node(print_index).unwrap().scope, 1);
    let start_exec = &compiled.node(index_of(compiled, start)).unwrap().ports[0];
    assert_eq!(start_exec.targets(), &[PortAddress::new(print_index, 0)]);
    let then = &compiled.node(print_index).unwrap().ports[1];
    assert_eq!(then.targets(), &[PortAddress::new(index_of(compiled, after), 0)]);
}

#[test]
fn test_subgraph_embedded_twice_gets_two_scopes() {
    let (inner, inner_print) = go_done_graph();
    let library = GraphLibrary::new().with(inner);

    let mut outer = Graph::new("outer");
    let start = outer.add_node(Node::new("event_start"));
    let first = outer.add_node(subgraph("inner"));
    let second = outer.add_node(subgraph("inner"));
    link(&mut outer, start, 0, first, 0);
    link(&mut outer, first, 1, second, 0);

    let compilation = compile_with(&outer, &library);
    let compiled = &compilation.graph;
    let copies: Vec<usize> = compiled.find(inner_print).collect();
    assert_eq!(copies.len(), 2);
    assert_ne!(compiled.node(copies[0]).unwrap().scope, compiled.node(copies[1]).unwrap().scope);

    // first copy's Then leads into the second copy
    let then = &compiled.node(copies[0]).unwrap().ports[1];
    assert_eq!(then.targets(), &[PortAddress::new(copies[1], 0)]);
}

#[test]
fn test_equal_boundary_signatures_collapse() {
    let mut inner = Graph::new("inner");
    let go_a = inner.add_node(boundary("Enter", "Go"));
    let go_b = inner.add_node(boundary("Enter", "Go"));
    let print_a = inner.add_node(Node::new("print_string"));
    let print_b = inner.add_node(Node::new("print_string"));
    link(&mut inner, go_a, 0, print_a, 0);
    link(&mut inner, go_b, 0, print_b, 0);
    let library = GraphLibrary::new().with(inner);

    let mut outer = Graph::new("outer");
    let start = outer.add_node(Node::new("event_start"));
    let sub = outer.add_node(subgraph("inner"));
    link(&mut outer, start, 0, sub, 0);

    let registry = create_blueprint_registry();
    let types = TypeRegistry::new();
    let compiler = Compiler::new(&registry, &types).with_library(&library);
    let diagnostics = compiler.refresh(&mut outer);
    assert!(has_issue(&diagnostics, |i| matches!(i, Issue::DuplicateBoundary { .. })));
    assert_eq!(outer.node(sub).unwrap().ports.len(), 1);

    let compilation = compiler.compile(&outer);
    let compiled = &compilation.graph;
    let start_exec = &compiled.node(index_of(compiled, start)).unwrap().ports[0];
    assert_eq!(
        start_exec.targets(),
        &[
            PortAddress::new(index_of(compiled, print_a), 0),
            PortAddress::new(index_of(compiled, print_b), 0),
        ]
    );
}

#[test]
fn test_unlinked_boundary_pruned_from_compound() {
    let (mut inner, _) = go_done_graph();
    inner.add_node(boundary("Enter", "Unused"));
    let library = GraphLibrary::new().with(inner);

    let mut outer = Graph::new("outer");
    let sub = outer.add_node(subgraph("inner"));

    let registry = create_blueprint_registry();
    let types = TypeRegistry::new();
    let diagnostics = Compiler::new(&registry, &types)
        .with_library(&library)
        .refresh(&mut outer);

    let names: Vec<&str> = outer.node(sub).unwrap().ports.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Go", "Done"]);
    assert!(has_issue(&diagnostics, |i| matches!(i, Issue::PrunedBoundary { name } if name == "Unused")));
}

#[test]
fn test_missing_and_recursive_subgraphs() {
    let mut outer = Graph::new("outer");
    let missing = outer.add_node(subgraph("nowhere"));
    let compilation = compile(&outer);
    assert_eq!(
        compilation.diagnostics.errors().next().map(|d| (&d.issue, d.node)),
        Some((&Issue::MissingSubgraph("nowhere".to_string()), Some(missing)))
    );

    let mut looped = Graph::new("looped");
    looped.add_node(subgraph("looped"));
    let library = GraphLibrary::new().with(looped.clone());
    let compilation = compile_with(&looped, &library);
    assert!(has_issue(&compilation.diagnostics, |i| matches!(i, Issue::RecursiveSubgraph(_))));
    assert!(compilation.graph.is_empty());
}

#[test]
fn test_boundary_data_flattening() {
    let mut inner = Graph::new("adder");
    let x = inner.add_node(
        boundary("Input", "X")
            .with_config("type", string("Float"))
            .with_config("default", Value::Float(5.0)),
    );
    let add = inner.add_node(Node::new("add"));
    let sum = inner.add_node(boundary("Output", "Sum"));
    link(&mut inner, x, 0, add, 0);
    link(&mut inner, add, 2, sum, 0);
    let library = GraphLibrary::new().with(inner);

    let mut outer = Graph::new("outer");
    let wired = outer.add_node(subgraph("adder"));
    let unwired = outer.add_node(subgraph("adder"));
    let constant = outer.add_node(Node::new("constant").with_config("value", Value::Float(2.0)));
    let reroute = outer.add_node(Node::new("reroute"));
    link(&mut outer, constant, 0, wired, 0);
    link(&mut outer, wired, 1, reroute, 0);
    link(&mut outer, unwired, 1, reroute, 0);

    let compilation = compile_with(&outer, &library);
    let compiled = &compilation.graph;
    assert!(compiled.nodes().iter().all(|n| n.node_type != "boundary"));

    let adds: Vec<usize> = compiled.find(add).collect();
    assert_eq!(adds.len(), 2);
    let a_of = |index: usize| compiled.node(index).unwrap().ports[0].source().clone();
    assert_eq!(
        a_of(adds[0]),
        DataSource::Port(PortAddress::new(index_of(compiled, constant), 0))
    );
    assert_eq!(a_of(adds[1]), DataSource::Constant(Value::Float(5.0)));

    // second link into the reroute input is a duplicate source
    let reroute_in = &compiled.node(index_of(compiled, reroute)).unwrap().ports[0];
    assert_eq!(reroute_in.source(), &DataSource::Port(PortAddress::new(adds[0], 2)));
    assert_eq!(reroute_in.port.data_type, Some(DataType::Float));
}

#[test]
fn test_dynamic_ports_follow_links() {
    let mut graph = Graph::new("main");
    let constant = graph.add_node(Node::new("constant").with_config("value", string("hi")));
    let first = graph.add_node(Node::new("reroute"));
    let second = graph.add_node(Node::new("reroute"));
    let print = graph.add_node(Node::new("print_string"));
    link(&mut graph, constant, 0, first, 0);
    link(&mut graph, first, 1, second, 0);
    link(&mut graph, second, 1, print, 2);

    let compilation = compile(&graph);
    assert!(compilation.diagnostics.is_empty(), "{}", compilation.diagnostics);
    let compiled = &compilation.graph;
    for id in [first, second] {
        let node = compiled.node(index_of(compiled, id)).unwrap();
        assert_eq!(node.ports[1].port.data_type, Some(DataType::String));
    }
}

#[test]
fn test_mutually_dependent_dynamic_ports_rejected() {
    let mut graph = Graph::new("main");
    let first = graph.add_node(Node::new("reroute"));
    let second = graph.add_node(Node::new("reroute"));
    link(&mut graph, first, 1, second, 0);
    link(&mut graph, second, 1, first, 0);

    let compilation = compile(&graph);
    let unresolved = compilation
        .diagnostics
        .errors()
        .filter(|d| matches!(d.issue, Issue::UnresolvedPortType { .. }))
        .count();
    assert_eq!(unresolved, 2);
    assert!(compilation.graph.is_empty());
}

#[test]
fn test_compilation_is_deterministic() {
    let (inner, _) = go_done_graph();
    let library = GraphLibrary::new().with(inner);

    let mut outer = Graph::new("outer");
    let start = outer.add_node(Node::new("event_start"));
    let sub = outer.add_node(subgraph("inner"));
    let goto = outer.add_node(Node::new("goto").with_config("label", string("end")));
    let label = outer.add_node(Node::new("label").with_config("label", string("end")));
    let print = outer.add_node(Node::new("print_string"));
    link(&mut outer, start, 0, sub, 0);
    link(&mut outer, sub, 1, goto, 0);
    link(&mut outer, label, 1, print, 0);

    let first = compile_with(&outer, &library).graph.to_bytes().unwrap();
    let second = compile_with(&outer, &library).graph.to_bytes().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_reconfigure_drops_links_to_removed_ports() {
    let mut graph = Graph::new("main");
    let sequence = graph.add_node(Node::new("sequence").with_config("count", Value::Int(3)));
    let print = graph.add_node(Node::new("print_string"));
    link(&mut graph, sequence, 3, print, 0);

    let registry = create_blueprint_registry();
    let types = TypeRegistry::new();
    let compiler = Compiler::new(&registry, &types);

    let diagnostics = compiler.refresh(&mut graph);
    assert!(diagnostics.is_empty());
    assert_eq!(graph.node(sequence).unwrap().ports.len(), 4);
    assert_eq!(graph.link_count(), 1);

    let config = NodeConfig::new().with("count", Value::Int(2));
    let diagnostics = compiler.reconfigure(&mut graph, sequence, config);
    assert!(has_issue(&diagnostics, |i| matches!(i, Issue::MissingPort { index: 3, .. })));
    assert_eq!(graph.node(sequence).unwrap().ports.len(), 3);
    assert_eq!(graph.link_count(), 0);
}

#[test]
fn test_moved_port_is_re_resolved_by_name() {
    let mut graph = Graph::new("main");
    let start = graph.add_node(Node::new("event_start"));
    let print = graph.add_node(Node::new("print_string"));
    graph.add_link(PortRef::new(start, 0), PortRef::named(print, 7, "Exec"));

    let registry = create_blueprint_registry();
    let types = TypeRegistry::new();
    let diagnostics = Compiler::new(&registry, &types).refresh(&mut graph);

    let diagnostic = diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.severity, Severity::Note);
    assert!(matches!(diagnostic.issue, Issue::PortMoved { from: 7, to: 0, .. }));

    let link = graph.links().next().unwrap();
    assert_eq!(link.to.index, 0);
    assert_eq!(link.from.name, "Exec");
}

#[test]
fn test_refreshed_ports_allow_validated_connect() {
    let mut graph = Graph::new("main");
    let branch = graph.add_node(Node::new("branch"));
    let print = graph.add_node(Node::new("print_string"));

    let registry = create_blueprint_registry();
    let types = TypeRegistry::new();
    Compiler::new(&registry, &types).refresh(&mut graph);

    assert!(graph.connect(&types, PortRef::new(branch, 2), PortRef::new(print, 0)).is_ok());
    assert!(graph.connect(&types, PortRef::new(branch, 0), PortRef::new(print, 0)).is_err());
    assert_eq!(
        graph.node(print).unwrap().ports[2].direction,
        PortDirection::Input
    );
}
