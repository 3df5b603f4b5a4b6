// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host event entry points.

use crate::behavior::{HostEvent, NodeBehavior, PortMeta, Subscription};
use crate::node::NodeId;
use crate::port::{DataType, Port};
use crate::runtime::{Blueprint, FlowError, NodeToken};
use crate::value::Value;

const EXEC: usize = 0;
const DELTA_TIME: usize = 1;

/// Fires `Exec` when the host starts the graph
#[derive(Debug, Clone, Copy, Default)]
pub struct EventStart;

impl NodeBehavior for EventStart {
    fn create_ports(&self, _meta: &PortMeta<'_>, _id: NodeId) -> Vec<Port> {
        vec![Port::exit("Exec")]
    }

    fn on_initialize(&self, bp: &mut Blueprint, token: NodeToken) -> Result<(), FlowError> {
        bp.subscribe(token, Subscription::Host(HostEvent::Start))
    }

    fn on_deinitialize(&self, bp: &mut Blueprint, token: NodeToken) {
        let _ = bp.unsubscribe(token, Subscription::Host(HostEvent::Start));
    }

    fn on_host_event(&self, bp: &mut Blueprint, token: NodeToken, event: HostEvent) -> Result<(), FlowError> {
        if event == HostEvent::Start {
            bp.fire(token, EXEC)?;
        }
        Ok(())
    }
}

/// Last delta delivered to an [`EventTick`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickState {
    /// Seconds since the previous tick
    pub delta: f32,
}

/// Fires `Exec` on every host tick
#[derive(Debug, Clone, Copy, Default)]
pub struct EventTick;

impl NodeBehavior for EventTick {
    fn create_ports(&self, _meta: &PortMeta<'_>, _id: NodeId) -> Vec<Port> {
        vec![Port::exit("Exec"), Port::output("Delta Time", DataType::Float)]
    }

    fn on_initialize(&self, bp: &mut Blueprint, token: NodeToken) -> Result<(), FlowError> {
        bp.subscribe(token, Subscription::Tick)
    }

    fn on_deinitialize(&self, bp: &mut Blueprint, token: NodeToken) {
        let _ = bp.unsubscribe(token, Subscription::Tick);
    }

    fn on_tick(&self, bp: &mut Blueprint, token: NodeToken, delta: f32) -> Result<(), FlowError> {
        bp.state_mut::<TickState>(token)?.delta = delta;
        bp.fire(token, EXEC)
    }

    fn port_value(&self, bp: &mut Blueprint, token: NodeToken, port: usize) -> Result<Value, FlowError> {
        if port != DELTA_TIME {
            return Ok(Value::None);
        }
        let delta = bp.state::<TickState>(token).map(|s| s.delta).unwrap_or_default();
        Ok(Value::Float(delta))
    }
}
