// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blueprint graph runtime for `OrdoPlay`.
//!
//! This crate turns authored node graphs into executable programs and runs
//! them inside a host loop:
//! - Graph model: nodes, ports, links, graph assets
//! - Node contract: the [`NodeBehavior`] trait every node implements
//! - Compiler: link validation, label jumps, subgraph flattening
//! - Engine: push-based control flow, pull-based data flow
//!
//! ## Architecture
//!
//! ```text
//! Graph --Compiler--> Arc<CompiledGraph> --> Blueprint (one per running instance)
//! ```
//!
//! The engine only ever sees the compiled form. A compiled graph is
//! immutable and shared; every [`Blueprint`] owns its own node state.

pub mod behavior;
pub mod compiled;
pub mod compiler;
pub mod connection;
pub mod diagnostic;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod port;
pub mod runtime;
pub mod settings;
pub mod types;
pub mod value;

pub use behavior::{HostEvent, NodeBehavior, PortMeta, Subscription, SubgraphMode, SubgraphRef};
pub use compiled::{CompiledGraph, PortAddress};
pub use compiler::{CompileOptions, Compilation, Compiler, SubgraphInterface};
pub use connection::{Link, LinkId, PortRef};
pub use diagnostic::{Diagnostic, Diagnostics, Issue, Severity};
pub use graph::{AssetError, Graph, GraphLibrary};
pub use node::{Node, NodeConfig, NodeId, NodeRegistry, NodeType};
pub use nodes::create_blueprint_registry;
pub use port::{DataType, Port, PortDirection, PortFlags};
pub use runtime::{Blueprint, FlowError, InstanceState, NodeToken, RuntimeConfig};
pub use settings::BlueprintSettings;
pub use types::TypeRegistry;
pub use value::{PortData, Value};
