// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime faults.

use super::InstanceState;
use crate::node::NodeId;

/// A fault that aborts the current top-level fire, read or tick.
///
/// The instance stays usable: the next call starts from a clean call depth.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlowError {
    /// Control or data flow nested deeper than the configured limit
    #[error("flow depth exceeded {limit} nested calls")]
    DepthExceeded {
        /// Configured limit
        limit: usize,
    },

    /// The operation is not allowed in the instance's lifecycle state
    #[error("instance is {found:?}, expected {expected}")]
    InvalidState {
        /// Current state
        found: InstanceState,
        /// What the operation needs
        expected: &'static str,
    },

    /// Token from another instance, out of range, or used after teardown
    #[error("stale or foreign node token")]
    StaleToken,

    /// No top-level boundary port with this name and direction
    #[error("unknown boundary port {0:?}")]
    UnknownBoundary(String),

    /// No external runner attached under this id
    #[error("no runner attached as {0:?}")]
    MissingRunner(String),

    /// The external runner is already executing further up the call chain
    #[error("runner {0:?} is busy")]
    RunnerBusy(String),

    /// The external runner faulted
    #[error("runner {id:?} failed: {source}")]
    Runner {
        /// Runner identifier
        id: String,
        /// Fault raised inside the runner
        #[source]
        source: Box<FlowError>,
    },

    /// A node reported a failure of its own
    #[error("node {node} failed: {message}")]
    Node {
        /// Authored node ID
        node: NodeId,
        /// What went wrong
        message: String,
    },
}
