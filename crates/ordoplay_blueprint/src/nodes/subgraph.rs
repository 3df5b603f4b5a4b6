// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compound node embedding another graph.

use crate::behavior::{NodeBehavior, PortMeta, SubgraphMode, SubgraphRef};
use crate::node::{NodeConfig, NodeConfigError, NodeId};
use crate::port::Port;
use crate::runtime::{Blueprint, FlowError, NodeToken};
use crate::value::Value;

/// Embeds the graph named by config `graph`.
///
/// Flattened by default. Setting `runner`, or `mode = "external"`, makes the
/// node proxy to a separately running instance attached under that runner
/// id (the graph name when `runner` is absent).
#[derive(Debug, Clone)]
pub struct SubgraphNode {
    subgraph: SubgraphRef,
}

impl SubgraphNode {
    /// Build from node configuration
    pub fn from_config(config: &NodeConfig) -> Result<Self, NodeConfigError> {
        let graph = config.require_string("graph")?.to_string();
        let runner = config.string("runner");

        let mode = match (config.string("mode"), runner) {
            (None | Some("flatten"), None) => SubgraphMode::Flatten,
            (None | Some("external"), Some(runner)) => SubgraphMode::External {
                runner: runner.to_string(),
            },
            (Some("external"), None) => SubgraphMode::External {
                runner: graph.clone(),
            },
            (Some(mode), _) => {
                return Err(NodeConfigError::Invalid {
                    key: "mode".to_string(),
                    reason: format!("{mode:?} is not \"flatten\" or \"external\" (a runner implies external)"),
                })
            }
        };

        Ok(Self {
            subgraph: SubgraphRef { graph, mode },
        })
    }

    fn runner(&self) -> Option<&str> {
        match &self.subgraph.mode {
            SubgraphMode::External { runner } => Some(runner),
            SubgraphMode::Flatten => None,
        }
    }
}

impl NodeBehavior for SubgraphNode {
    fn create_ports(&self, meta: &PortMeta<'_>, _id: NodeId) -> Vec<Port> {
        meta.interface(&self.subgraph.graph)
            .map(|interface| interface.outer_ports())
            .unwrap_or_default()
    }

    fn subgraph(&self) -> Option<&SubgraphRef> {
        Some(&self.subgraph)
    }

    fn on_enter_port(&self, bp: &mut Blueprint, token: NodeToken, port: usize) -> Result<(), FlowError> {
        match self.runner() {
            Some(runner) => bp.proxy_enter(runner, token, port),
            None => Ok(()),
        }
    }

    fn port_value(&self, bp: &mut Blueprint, token: NodeToken, port: usize) -> Result<Value, FlowError> {
        match self.runner() {
            Some(runner) => bp.proxy_read(runner, token, port),
            None => Ok(Value::None),
        }
    }
}
