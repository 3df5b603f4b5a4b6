// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compile diagnostics.
//!
//! Compilation is best effort: a node or link that fails validation is left
//! out of the compiled graph and reported here, and everything else still
//! compiles. Diagnostics are collected, never raised.

use crate::node::{NodeConfigError, NodeId};
use crate::port::DataType;
use std::fmt;

/// How bad a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational; nothing was dropped
    Note,
    /// Something was dropped or defaulted
    Warning,
    /// A node was excluded from the compiled graph
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Note => "note",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// What went wrong
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Issue {
    /// No factory registered for the node type
    #[error("unknown node type {0:?}")]
    UnknownNodeType(String),

    /// The factory rejected the configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(NodeConfigError),

    /// A port declares a type missing from the type registry
    #[error("port {port:?} uses unregistered type {data_type}")]
    UnregisteredType {
        /// Port name
        port: String,
        /// The unknown type
        data_type: DataType,
    },

    /// A dynamic port never received a type (mutually dependent dynamic ports)
    #[error("type of port {port:?} could not be inferred; dynamic ports depend on each other")]
    UnresolvedPortType {
        /// Port name
        port: String,
    },

    /// Port shapes kept changing past the pass limit
    #[error("ports did not settle after {passes} passes")]
    PortsDidNotSettle {
        /// Passes run
        passes: usize,
    },

    /// A link references a node that is absent or was excluded
    #[error("link references missing node {0}")]
    MissingNode(NodeId),

    /// A link references a port that no longer exists
    #[error("link references missing port {index} ({name:?})")]
    MissingPort {
        /// Port index recorded in the link
        index: usize,
        /// Port name recorded in the link
        name: String,
    },

    /// A link's port moved; it was re-resolved by name
    #[error("port {name:?} moved from index {from} to {to}")]
    PortMoved {
        /// Port name
        name: String,
        /// Recorded index
        from: usize,
        /// Current index
        to: usize,
    },

    /// Link joins ports whose directions do not pair up
    #[error("cannot link {from} port {from_port:?} to {to} port {to_port:?}")]
    IncompatibleDirection {
        /// Source port direction
        from: &'static str,
        /// Source port name
        from_port: String,
        /// Target port direction
        to: &'static str,
        /// Target port name
        to_port: String,
    },

    /// Input type does not accept the output type
    #[error("input {input_port:?} of type {input} does not accept {output}")]
    IncompatibleTypes {
        /// Target port name
        input_port: String,
        /// Target type
        input: DataType,
        /// Source type
        output: DataType,
    },

    /// A data input was given a second source
    #[error("input {port:?} already has a source")]
    DuplicateSource {
        /// Target port name
        port: String,
    },

    /// An Exit label matches no Enter label
    #[error("no Enter port carries label {0:?}")]
    DanglingLabel(String),

    /// Several Enter ports carry the empty label; the first is the default entry
    #[error("{0} Enter ports carry the empty label; using the first as default entry")]
    AmbiguousDefaultEntry(usize),

    /// Two boundary stubs share a signature and were collapsed
    #[error("boundary {name:?} duplicates an earlier stub and was collapsed onto it")]
    DuplicateBoundary {
        /// Boundary name
        name: String,
    },

    /// A boundary stub with no inner links was dropped from the interface
    #[error("boundary {name:?} has no links and was pruned")]
    PrunedBoundary {
        /// Boundary name
        name: String,
    },

    /// A subgraph node references a graph missing from the library
    #[error("subgraph {0:?} not found in library")]
    MissingSubgraph(String),

    /// A subgraph embeds itself, directly or indirectly
    #[error("subgraph {0:?} embeds itself")]
    RecursiveSubgraph(String),

    /// Boundary forwarding loops back on itself
    #[error("boundary forwarding through port {port:?} loops back on itself")]
    ForwardingCycle {
        /// Port where the loop was found
        port: String,
    },
}

impl Issue {
    /// Default severity for this issue
    pub fn severity(&self) -> Severity {
        match self {
            Self::PortMoved { .. } | Self::PrunedBoundary { .. } => Severity::Note,
            Self::UnknownNodeType(_)
            | Self::InvalidConfig(_)
            | Self::UnregisteredType { .. }
            | Self::UnresolvedPortType { .. }
            | Self::PortsDidNotSettle { .. }
            | Self::MissingSubgraph(_)
            | Self::RecursiveSubgraph(_) => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

/// One reported problem
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Graph asset the problem was found in
    pub graph: String,
    /// Node the problem concerns, if any
    pub node: Option<NodeId>,
    /// The problem
    pub issue: Issue,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}]", self.severity, self.graph)?;
        if let Some(node) = self.node {
            write!(f, " node {node}")?;
        }
        write!(f, ": {}", self.issue)
    }
}

/// Collected diagnostics of one compile pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issue
    pub fn report(&mut self, graph: &str, node: Option<NodeId>, issue: Issue) {
        let diagnostic = Diagnostic {
            severity: issue.severity(),
            graph: graph.to_string(),
            node,
            issue,
        };
        match diagnostic.severity {
            Severity::Error | Severity::Warning => tracing::warn!("{}", diagnostic),
            Severity::Note => tracing::debug!("{}", diagnostic),
        }
        self.items.push(diagnostic);
    }

    /// Append another list
    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Iterate diagnostics in report order
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Iterate error-severity diagnostics
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    /// Whether any error was reported
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Number of diagnostics
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing was reported
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.items {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
