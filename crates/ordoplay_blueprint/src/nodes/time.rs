// SPDX-License-Identifier: MIT OR Apache-2.0
//! Multi-tick suspension.

use crate::behavior::{NodeBehavior, PortMeta, Subscription};
use crate::node::{NodeConfig, NodeId};
use crate::port::{DataType, Port};
use crate::runtime::{Blueprint, FlowError, NodeToken};
use crate::value::Value;

const START: usize = 0;
const CANCEL: usize = 1;
const SECONDS: usize = 2;
const COMPLETED: usize = 3;

/// Countdown of one [`Delay`] instance
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DelayState {
    /// Seconds left, while counting down
    pub remaining: Option<f32>,
}

/// Fires `Completed` once `Seconds` of host ticks have elapsed after `Start`.
///
/// Restarting resets the countdown. `Cancel` stops it without firing.
#[derive(Debug, Clone, Copy)]
pub struct Delay {
    seconds: f32,
}

impl Delay {
    /// Build from node configuration; `seconds` defaults to 1
    pub fn from_config(config: &NodeConfig) -> Self {
        Self {
            seconds: config.float("seconds").unwrap_or(1.0),
        }
    }
}

impl NodeBehavior for Delay {
    fn create_ports(&self, _meta: &PortMeta<'_>, _id: NodeId) -> Vec<Port> {
        vec![
            Port::enter("Start"),
            Port::enter("Cancel"),
            Port::input("Seconds", DataType::Float).with_default(Value::Float(self.seconds)),
            Port::exit("Completed"),
        ]
    }

    fn on_enter_port(&self, bp: &mut Blueprint, token: NodeToken, port: usize) -> Result<(), FlowError> {
        match port {
            START => {
                let seconds: f32 = bp.read(token, SECONDS)?;
                bp.state_mut::<DelayState>(token)?.remaining = Some(seconds);
                bp.subscribe(token, Subscription::Tick)
            }
            CANCEL => {
                bp.state_mut::<DelayState>(token)?.remaining = None;
                bp.unsubscribe(token, Subscription::Tick)
            }
            _ => Ok(()),
        }
    }

    fn on_tick(&self, bp: &mut Blueprint, token: NodeToken, delta: f32) -> Result<(), FlowError> {
        let state = bp.state_mut::<DelayState>(token)?;
        let Some(remaining) = state.remaining else {
            return bp.unsubscribe(token, Subscription::Tick);
        };

        let remaining = remaining - delta;
        if remaining > 0.0 {
            state.remaining = Some(remaining);
            return Ok(());
        }

        state.remaining = None;
        bp.unsubscribe(token, Subscription::Tick)?;
        bp.fire(token, COMPLETED)
    }

    fn on_deinitialize(&self, bp: &mut Blueprint, token: NodeToken) {
        let _ = bp.unsubscribe(token, Subscription::Tick);
    }
}
