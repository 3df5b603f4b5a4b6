// SPDX-License-Identifier: MIT OR Apache-2.0
//! Run-time node identities.

use crate::compiled::ScopeId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one running [`Blueprint`](super::Blueprint)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One instantiation of a compiled node inside one running instance.
///
/// The same authored node embedded by two compound nodes compiles to two
/// nodes with distinct tokens and independent state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeToken {
    pub(crate) instance: InstanceId,
    pub(crate) index: usize,
    pub(crate) scope: ScopeId,
}

impl NodeToken {
    /// Running instance the token belongs to
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    /// Index into the compiled node array
    pub fn index(&self) -> usize {
        self.index
    }

    /// Embedding scope of the node
    pub fn scope(&self) -> ScopeId {
        self.scope
    }
}
