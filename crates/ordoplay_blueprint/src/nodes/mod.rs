// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node library.

mod boundary;
mod events;
mod flow;
mod math;
mod subgraph;
mod time;

pub use boundary::BoundaryNode;
pub use events::{EventStart, EventTick, TickState};
pub use flow::{Branch, Goto, Label, PrintLog, PrintString, Sequence};
pub use math::{Add, AddStats, Constant, Reroute};
pub use subgraph::SubgraphNode;
pub use time::{Delay, DelayState};

use crate::behavior::NodeBehavior;
use crate::node::{NodeCategory, NodeRegistry, NodeType};
use std::sync::Arc;

fn shared<B: NodeBehavior>(behavior: B) -> Arc<dyn NodeBehavior> {
    Arc::new(behavior)
}

/// Create a registry holding every built-in node type
pub fn create_blueprint_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    // Composition
    registry.register(
        NodeType::new("boundary", "Boundary", NodeCategory::Composition, |config| {
            Ok(shared(BoundaryNode::from_config(config)?))
        })
        .with_description("Pin forwarded to the compound node embedding this graph"),
    );
    registry.register(
        NodeType::new("subgraph", "Subgraph", NodeCategory::Composition, |config| {
            Ok(shared(SubgraphNode::from_config(config)?))
        })
        .with_description("Embeds another graph as a single node"),
    );

    // Events
    registry.register(
        NodeType::new("event_start", "Event Start", NodeCategory::Event, |_| Ok(shared(EventStart)))
            .with_description("Triggered when the host starts the graph"),
    );
    registry.register(
        NodeType::new("event_tick", "Event Tick", NodeCategory::Event, |_| Ok(shared(EventTick)))
            .with_description("Triggered every host tick"),
    );

    // Flow control
    registry.register(
        NodeType::new("branch", "Branch", NodeCategory::Flow, |_| Ok(shared(Branch)))
            .with_description("If/else branching"),
    );
    registry.register(
        NodeType::new("sequence", "Sequence", NodeCategory::Flow, |config| {
            Ok(shared(Sequence::from_config(config)?))
        })
        .with_description("Fire each output in order"),
    );
    registry.register(
        NodeType::new("goto", "Goto", NodeCategory::Flow, |config| Ok(shared(Goto::from_config(config))))
            .with_description("Jump to the label with the same name"),
    );
    registry.register(
        NodeType::new("label", "Label", NodeCategory::Flow, |config| Ok(shared(Label::from_config(config))))
            .with_description("Jump target for goto nodes"),
    );

    // Values
    registry.register(
        NodeType::new("constant", "Constant", NodeCategory::Math, |config| {
            Ok(shared(Constant::from_config(config)?))
        })
        .with_description("A fixed value"),
    );
    registry.register(
        NodeType::new("add", "Add", NodeCategory::Math, |_| Ok(shared(Add)))
            .with_description("Add two floats"),
    );
    registry.register(
        NodeType::new("reroute", "Reroute", NodeCategory::Utility, |_| Ok(shared(Reroute)))
            .with_description("Pass a value through; takes the type of what it connects"),
    );

    // Time
    registry.register(
        NodeType::new("delay", "Delay", NodeCategory::Time, |config| Ok(shared(Delay::from_config(config))))
            .with_description("Fire after a number of seconds of host ticks"),
    );

    // Utility
    registry.register(
        NodeType::new("print_string", "Print String", NodeCategory::Utility, |config| {
            Ok(shared(PrintString::from_config(config)))
        })
        .with_description("Print a string to the log"),
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeConfig;

    #[test]
    fn test_registry_has_builtins() {
        let registry = create_blueprint_registry();
        for id in ["boundary", "subgraph", "event_start", "print_string", "delay", "reroute"] {
            assert!(registry.get(id).is_some(), "missing {id}");
        }
        assert_eq!(registry.types_in_category(NodeCategory::Event).count(), 2);
    }

    #[test]
    fn test_factory_rejects_bad_config() {
        let registry = create_blueprint_registry();
        let subgraph = registry.get("subgraph").unwrap();
        assert!(subgraph.instantiate(&NodeConfig::new()).is_err());

        let sequence = registry.get("sequence").unwrap();
        let config = NodeConfig::new().with("count", crate::Value::Int(0));
        assert!(sequence.instantiate(&config).is_err());
    }
}
