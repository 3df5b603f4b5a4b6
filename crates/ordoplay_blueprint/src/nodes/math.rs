// SPDX-License-Identifier: MIT OR Apache-2.0
//! Value nodes.

use crate::behavior::{LinkedType, NodeBehavior, PortMeta};
use crate::node::{NodeConfig, NodeConfigError, NodeId};
use crate::port::{DataType, Port, PortDirection};
use crate::runtime::{Blueprint, FlowError, NodeToken};
use crate::value::{PortData, Value};

/// Outputs the configured `value`
#[derive(Debug, Clone)]
pub struct Constant {
    value: Value,
    data_type: DataType,
}

impl Constant {
    /// Build from node configuration. The type comes from `type` when set,
    /// else from the value.
    pub fn from_config(config: &NodeConfig) -> Result<Self, NodeConfigError> {
        let value = config
            .get("value")
            .cloned()
            .ok_or_else(|| NodeConfigError::Missing("value".to_string()))?;
        let data_type = config
            .string("type")
            .map(DataType::from_name)
            .or_else(|| value.data_type())
            .ok_or_else(|| NodeConfigError::Invalid {
                key: "type".to_string(),
                reason: "required when the value has no built-in type".to_string(),
            })?;
        Ok(Self { value, data_type })
    }
}

impl NodeBehavior for Constant {
    fn create_ports(&self, _meta: &PortMeta<'_>, _id: NodeId) -> Vec<Port> {
        vec![Port::output("Value", self.data_type.clone())]
    }

    fn port_value(&self, _bp: &mut Blueprint, _token: NodeToken, _port: usize) -> Result<Value, FlowError> {
        Ok(self.value.clone())
    }
}

/// Evaluation counter of one [`Add`] instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddStats {
    /// Times `Result` was read
    pub evaluations: usize,
}

/// `Result = A + B`, evaluated on every read
#[derive(Debug, Clone, Copy, Default)]
pub struct Add;

impl NodeBehavior for Add {
    fn create_ports(&self, _meta: &PortMeta<'_>, _id: NodeId) -> Vec<Port> {
        vec![
            Port::input("A", DataType::Float),
            Port::input("B", DataType::Float),
            Port::output("Result", DataType::Float),
        ]
    }

    fn port_value(&self, bp: &mut Blueprint, token: NodeToken, port: usize) -> Result<Value, FlowError> {
        if port != 2 {
            return Ok(Value::None);
        }
        bp.state_mut::<AddStats>(token)?.evaluations += 1;
        let a: f32 = bp.read(token, 0)?;
        let b: f32 = bp.read(token, 1)?;
        Ok((a + b).into_value())
    }
}

/// Passes `In` to `Out`. Both take the type of the consumer, else of the
/// source, else `Any`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reroute;

impl NodeBehavior for Reroute {
    fn create_ports(&self, meta: &PortMeta<'_>, id: NodeId) -> Vec<Port> {
        let data_type = match (meta.linked_type(id, 1), meta.linked_type(id, 0)) {
            (LinkedType::Resolved(consumer), _) if consumer != DataType::Any => Some(consumer),
            (_, LinkedType::Resolved(source)) => Some(source),
            (LinkedType::Pending, _) | (_, LinkedType::Pending) => None,
            _ => Some(DataType::Any),
        };

        let mut input = Port::untyped("In", PortDirection::Input);
        let mut output = Port::untyped("Out", PortDirection::Output);
        input.data_type = data_type.clone();
        output.data_type = data_type;
        vec![input, output]
    }

    fn on_links_changed(&self, _meta: &PortMeta<'_>, _id: NodeId) -> bool {
        true
    }

    fn port_value(&self, bp: &mut Blueprint, token: NodeToken, port: usize) -> Result<Value, FlowError> {
        if port != 1 {
            return Ok(Value::None);
        }
        bp.read_value(token, 0)
    }
}
