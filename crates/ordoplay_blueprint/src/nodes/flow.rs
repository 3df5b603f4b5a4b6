// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flow control and printing.

use crate::behavior::{NodeBehavior, PortMeta};
use crate::node::{NodeConfig, NodeConfigError, NodeId};
use crate::port::{DataType, Port};
use crate::runtime::{Blueprint, FlowError, NodeToken};
use crate::value::Value;

/// Lines printed by one [`PrintString`] instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrintLog {
    /// Printed text, oldest first
    pub lines: Vec<String>,
}

/// Logs its `Text` input, then fires `Then`.
///
/// Ports: 0 `Exec` (enter), 1 `Then` (exit), 2 `Text` (input).
#[derive(Debug, Clone)]
pub struct PrintString {
    text: String,
}

impl PrintString {
    const THEN: usize = 1;
    const TEXT: usize = 2;

    /// Build from node configuration; `text` sets the default
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            text: config.string("text").unwrap_or("hello").to_string(),
        }
    }
}

impl NodeBehavior for PrintString {
    fn create_ports(&self, _meta: &PortMeta<'_>, _id: NodeId) -> Vec<Port> {
        vec![
            Port::enter("Exec"),
            Port::exit("Then"),
            Port::input("Text", DataType::String).with_default(Value::String(self.text.clone())),
        ]
    }

    fn on_enter_port(&self, bp: &mut Blueprint, token: NodeToken, _port: usize) -> Result<(), FlowError> {
        let text: String = bp.read(token, Self::TEXT)?;
        tracing::info!("{}", text);
        bp.state_mut::<PrintLog>(token)?.lines.push(text);
        bp.fire(token, Self::THEN)
    }
}

/// Fires `True` or `False` depending on `Condition`
#[derive(Debug, Clone, Copy, Default)]
pub struct Branch;

impl NodeBehavior for Branch {
    fn create_ports(&self, _meta: &PortMeta<'_>, _id: NodeId) -> Vec<Port> {
        vec![
            Port::enter("Exec"),
            Port::input("Condition", DataType::Bool),
            Port::exit("True"),
            Port::exit("False"),
        ]
    }

    fn on_enter_port(&self, bp: &mut Blueprint, token: NodeToken, _port: usize) -> Result<(), FlowError> {
        let condition: bool = bp.read(token, 1)?;
        bp.fire(token, if condition { 2 } else { 3 })
    }
}

/// Fires `count` exits one after another
#[derive(Debug, Clone, Copy)]
pub struct Sequence {
    count: usize,
}

impl Sequence {
    /// Build from node configuration; `count` defaults to 2
    pub fn from_config(config: &NodeConfig) -> Result<Self, NodeConfigError> {
        let count = config.int("count").unwrap_or(2);
        match usize::try_from(count) {
            Ok(count) if count > 0 => Ok(Self { count }),
            _ => Err(NodeConfigError::Invalid {
                key: "count".to_string(),
                reason: format!("expected at least one output, got {count}"),
            }),
        }
    }
}

impl NodeBehavior for Sequence {
    fn create_ports(&self, _meta: &PortMeta<'_>, _id: NodeId) -> Vec<Port> {
        std::iter::once(Port::enter("Exec"))
            .chain((0..self.count).map(|i| Port::exit(format!("Then {i}"))))
            .collect()
    }

    fn on_enter_port(&self, bp: &mut Blueprint, token: NodeToken, _port: usize) -> Result<(), FlowError> {
        for exit in 1..=self.count {
            bp.fire(token, exit)?;
        }
        Ok(())
    }
}

/// Jumps to every `label` node carrying the same label. The empty label
/// jumps to the graph's default entry.
#[derive(Debug, Clone)]
pub struct Goto {
    label: String,
}

impl Goto {
    /// Build from node configuration
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            label: config.string("label").unwrap_or_default().to_string(),
        }
    }
}

impl NodeBehavior for Goto {
    fn create_ports(&self, _meta: &PortMeta<'_>, _id: NodeId) -> Vec<Port> {
        vec![Port::enter("Exec"), Port::exit("Jump")]
    }

    fn linked_port(&self, port: usize) -> Option<&str> {
        (port == 1).then_some(self.label.as_str())
    }

    fn on_enter_port(&self, bp: &mut Blueprint, token: NodeToken, _port: usize) -> Result<(), FlowError> {
        bp.fire(token, 1)
    }
}

/// Jump target: its `Exec` port carries `label`
#[derive(Debug, Clone)]
pub struct Label {
    label: String,
}

impl Label {
    /// Build from node configuration
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            label: config.string("label").unwrap_or_default().to_string(),
        }
    }
}

impl NodeBehavior for Label {
    fn create_ports(&self, _meta: &PortMeta<'_>, _id: NodeId) -> Vec<Port> {
        vec![Port::enter("Exec").with_label(self.label.clone()), Port::exit("Then")]
    }

    fn on_enter_port(&self, bp: &mut Blueprint, token: NodeToken, _port: usize) -> Result<(), FlowError> {
        bp.fire(token, 1)
    }
}
