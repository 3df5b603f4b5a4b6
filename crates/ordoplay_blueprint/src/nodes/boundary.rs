// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subgraph boundary stub.

use crate::behavior::{LinkedType, NodeBehavior, PortMeta};
use crate::node::{NodeConfig, NodeConfigError, NodeId};
use crate::port::{DataType, Port, PortDirection, PortFlags};
use crate::runtime::{Blueprint, FlowError, NodeToken};
use crate::value::Value;

/// A pin of the enclosing compound node, seen from inside the graph.
///
/// `direction` is the pin's direction on the compound node; the stub's own
/// port points the other way. Config: `direction`, `name`, optional `type`
/// (inferred from the inner link when absent) and `default`.
#[derive(Debug, Clone)]
pub struct BoundaryNode {
    name: String,
    direction: PortDirection,
    data_type: Option<DataType>,
    default: Option<Value>,
}

impl BoundaryNode {
    /// Build from node configuration
    pub fn from_config(config: &NodeConfig) -> Result<Self, NodeConfigError> {
        let name = config.require_string("name")?.to_string();
        let direction = config.require_string("direction")?;
        let direction = PortDirection::from_name(direction).ok_or_else(|| NodeConfigError::Invalid {
            key: "direction".to_string(),
            reason: format!("{direction:?} is not Enter, Exit, Input or Output"),
        })?;

        Ok(Self {
            name,
            direction,
            data_type: config.string("type").map(DataType::from_name),
            default: config.get("default").cloned(),
        })
    }

    /// Pin name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pin direction on the compound node
    pub fn direction(&self) -> PortDirection {
        self.direction
    }
}

impl NodeBehavior for BoundaryNode {
    fn create_ports(&self, meta: &PortMeta<'_>, id: NodeId) -> Vec<Port> {
        let mut port = Port::untyped(self.name.clone(), self.direction.opposite())
            .with_flags(PortFlags::EXTERNAL);

        if self.direction.is_data() {
            port.data_type = match &self.data_type {
                Some(data_type) => Some(data_type.clone()),
                None => match meta.linked_type(id, 0) {
                    LinkedType::Resolved(data_type) => Some(data_type),
                    LinkedType::Pending => None,
                    LinkedType::Unlinked | LinkedType::Conflict => Some(DataType::Any),
                },
            };
            port.default_value = self.default.clone();
        }

        vec![port]
    }

    fn on_links_changed(&self, _meta: &PortMeta<'_>, _id: NodeId) -> bool {
        self.direction.is_data() && self.data_type.is_none()
    }

    fn on_enter_port(&self, bp: &mut Blueprint, _token: NodeToken, _port: usize) -> Result<(), FlowError> {
        if self.direction == PortDirection::Exit {
            bp.exit_boundary(&self.name);
        }
        Ok(())
    }

    fn port_value(&self, bp: &mut Blueprint, _token: NodeToken, _port: usize) -> Result<Value, FlowError> {
        if self.direction == PortDirection::Input {
            return Ok(bp.boundary_input(&self.name).cloned().unwrap_or_default());
        }
        Ok(Value::None)
    }
}
