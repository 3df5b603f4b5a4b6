// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution engine.
//!
//! A [`Blueprint`] is one running instance of a [`CompiledGraph`]. Control
//! flow is pushed: firing an Exit port synchronously enters every linked
//! Enter port, depth-first, in link order. Data flow is pulled: reading an
//! Input walks to its source Output and asks that node for a value, every
//! time, with no engine-side caching. Missing links and undeclared ports
//! read the port's default.
//!
//! The instance owns all mutable state. The compiled graph and the node
//! behaviors in it are shared read-only between instances.

mod error;
mod runner;
mod token;


pub use error::FlowError;
pub use token::{InstanceId, NodeToken};

use crate::behavior::{HostEvent, NodeBehavior, Subscription};
use crate::compiled::{BoundaryPort, CompiledGraph, DataSource, PortAddress};
use crate::node::NodeId;
use crate::port::PortDirection;
use crate::value::{PortData, Value};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Engine tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Nested enters and reads allowed below one top-level call
    pub max_flow_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { max_flow_depth: 256 }
    }
}

/// Lifecycle of a running instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceState {
    /// Created, nodes not initialized yet
    Uninitialized,
    /// Every node initialized
    Initialized,
    /// Started by the host
    Running,
    /// Torn down; terminal
    DeInitialized,
}

/// One running instance of a compiled graph
pub struct Blueprint {
    graph: Arc<CompiledGraph>,
    config: RuntimeConfig,
    instance: InstanceId,
    state: InstanceState,
    /// Number of nodes whose `on_initialize` succeeded
    initialized: usize,
    node_state: Vec<Option<Box<dyn Any>>>,
    /// Removed entries are set to `None` and compacted once no dispatch is
    /// in progress
    subscriptions: Vec<Option<(NodeToken, Subscription)>>,
    depth: usize,
    boundary_inputs: HashMap<String, Value>,
    boundary_exits: Vec<String>,
    runners: HashMap<String, Rc<RefCell<Blueprint>>>,
}

impl Blueprint {
    /// Create an uninitialized instance
    pub fn new(graph: Arc<CompiledGraph>) -> Self {
        let node_state = std::iter::repeat_with(|| None).take(graph.len()).collect();
        Self {
            graph,
            config: RuntimeConfig::default(),
            instance: InstanceId::next(),
            state: InstanceState::Uninitialized,
            initialized: 0,
            node_state,
            subscriptions: Vec::new(),
            depth: 0,
            boundary_inputs: HashMap::new(),
            boundary_exits: Vec::new(),
            runners: HashMap::new(),
        }
    }

    /// Set the engine configuration
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// The compiled graph being run
    pub fn graph(&self) -> &Arc<CompiledGraph> {
        &self.graph
    }

    /// Engine configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Identity of this instance
    pub fn id(&self) -> InstanceId {
        self.instance
    }

    /// Current lifecycle state
    pub fn instance_state(&self) -> InstanceState {
        self.state
    }

    // -- Lifecycle --

    /// Initialize every node in array order.
    ///
    /// If a node fails, the nodes initialized before it are torn down in
    /// reverse order and the instance ends up `DeInitialized`.
    pub fn initialize(&mut self) -> Result<(), FlowError> {
        self.expect_state(&[InstanceState::Uninitialized], "Uninitialized")?;

        let graph = self.graph.clone();
        for (index, node) in graph.nodes().iter().enumerate() {
            let token = self.token_at(index);
            if let Err(err) = node.behavior().on_initialize(self, token) {
                tracing::warn!(
                    "Node {} ({}) failed to initialize in {:?}: {}",
                    node.id,
                    node.node_type,
                    graph.name(),
                    err
                );
                self.teardown();
                return Err(err);
            }
            self.initialized = index + 1;
        }

        self.state = InstanceState::Initialized;
        tracing::debug!("Blueprint {:?} {} initialized", graph.name(), self.instance);
        Ok(())
    }

    /// Move to `Running` and deliver [`HostEvent::Start`]
    pub fn start(&mut self) -> Result<(), FlowError> {
        self.expect_state(&[InstanceState::Initialized], "Initialized")?;
        self.state = InstanceState::Running;
        tracing::debug!("Blueprint {:?} {} running", self.graph.name(), self.instance);
        self.notify(HostEvent::Start)
    }

    /// Tear every initialized node down in reverse order. Idempotent.
    pub fn deinitialize(&mut self) {
        match self.state {
            InstanceState::DeInitialized => {}
            InstanceState::Uninitialized => self.state = InstanceState::DeInitialized,
            InstanceState::Initialized | InstanceState::Running => self.teardown(),
        }
    }

    fn teardown(&mut self) {
        let graph = self.graph.clone();
        for index in (0..self.initialized).rev() {
            let token = self.token_at(index);
            if let Some(node) = graph.node(index) {
                node.behavior().on_deinitialize(self, token);
            }
        }
        self.initialized = 0;
        if self.depth == 0 {
            self.subscriptions.clear();
        } else {
            // A dispatch further up is still walking the list
            self.subscriptions.iter_mut().for_each(|entry| *entry = None);
        }
        self.node_state.iter_mut().for_each(|slot| *slot = None);
        self.boundary_exits.clear();
        self.state = InstanceState::DeInitialized;
        tracing::debug!("Blueprint {:?} {} deinitialized", graph.name(), self.instance);
    }

    fn expect_state(&self, allowed: &[InstanceState], expected: &'static str) -> Result<(), FlowError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(FlowError::InvalidState {
                found: self.state,
                expected,
            })
        }
    }

    fn expect_live(&self) -> Result<(), FlowError> {
        self.expect_state(
            &[InstanceState::Initialized, InstanceState::Running],
            "Initialized or Running",
        )
    }

    // -- Tokens --

    fn token_at(&self, index: usize) -> NodeToken {
        NodeToken {
            instance: self.instance,
            index,
            scope: self.graph.node(index).map(|n| n.scope).unwrap_or_default(),
        }
    }

    /// Token of the compiled node at `index`
    pub fn token(&self, index: usize) -> Option<NodeToken> {
        (index < self.graph.len()).then(|| self.token_at(index))
    }

    /// Tokens of every compiled copy of an authored node
    pub fn tokens_of(&self, id: NodeId) -> Vec<NodeToken> {
        self.graph.find(id).map(|index| self.token_at(index)).collect()
    }

    fn check_token(&self, token: NodeToken) -> Result<(), FlowError> {
        if token.instance != self.instance
            || token.index >= self.graph.len()
            || self.state == InstanceState::DeInitialized
        {
            return Err(FlowError::StaleToken);
        }
        Ok(())
    }

    /// Run `f` one level deeper, failing instead of exceeding the depth limit.
    /// Leaving the outermost level compacts the subscription list.
    fn nested<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R, FlowError>) -> Result<R, FlowError> {
        if self.depth >= self.config.max_flow_depth {
            return Err(FlowError::DepthExceeded {
                limit: self.config.max_flow_depth,
            });
        }

        self.depth += 1;
        let result = f(self);
        self.depth -= 1;

        if self.depth == 0 {
            self.compact_subscriptions();
            if let Err(err) = &result {
                tracing::warn!("Blueprint {:?} {} aborted: {}", self.graph.name(), self.instance, err);
            }
        }
        result
    }

    // -- Control flow --

    /// Fire an Exit port: enter every linked Enter port in link order.
    ///
    /// Firing anything but a linked Exit port does nothing.
    pub fn fire(&mut self, token: NodeToken, exit: usize) -> Result<(), FlowError> {
        self.check_token(token)?;
        self.expect_live()?;

        let graph = self.graph.clone();
        let Some(port) = graph.node(token.index).and_then(|n| n.port(exit)) else {
            tracing::trace!("Fire of undeclared port {} on node {}", exit, token.index);
            return Ok(());
        };
        if port.port.direction != PortDirection::Exit {
            tracing::trace!("Fire of non-exit port {:?} on node {}", port.port.name, token.index);
            return Ok(());
        }

        for target in port.targets() {
            let target_token = self.token_at(target.node);
            self.enter(target_token, target.port)?;
        }
        Ok(())
    }

    /// Enter an Enter port directly
    pub fn enter(&mut self, token: NodeToken, port: usize) -> Result<(), FlowError> {
        self.check_token(token)?;
        self.expect_live()?;

        let graph = self.graph.clone();
        let Some(node) = graph.node(token.index) else {
            return Ok(());
        };
        match node.port(port) {
            Some(p) if p.port.direction == PortDirection::Enter => {
                tracing::trace!("Enter {}.{:?}", node.node_type, p.port.name);
            }
            _ => return Ok(()),
        }

        self.nested(|bp| node.behavior().on_enter_port(bp, token, port))
    }

    // -- Data flow --

    /// Read a data port as `T`.
    ///
    /// Unconnected inputs, undeclared ports, and values that do not convert
    /// to `T` all resolve to the port's default, then to `T::default()`.
    pub fn read<T: PortData>(&mut self, token: NodeToken, port: usize) -> Result<T, FlowError> {
        let value = self.read_value(token, port)?;
        let default = self
            .graph
            .node(token.index)
            .and_then(|n| n.port(port))
            .map(|p| p.default.clone())
            .unwrap_or_default();
        Ok(resolve_or_default(value, default))
    }

    /// Read a data port as a raw [`Value`], defaulted when unset
    pub fn read_value(&mut self, token: NodeToken, port: usize) -> Result<Value, FlowError> {
        self.check_token(token)?;
        self.expect_live()?;

        let graph = self.graph.clone();
        let Some(compiled) = graph.node(token.index).and_then(|n| n.port(port)) else {
            return Ok(Value::None);
        };

        let value = match compiled.port.direction {
            PortDirection::Input => match compiled.source() {
                DataSource::Port(source) => self.pull(*source)?,
                DataSource::Constant(value) => value.clone(),
                DataSource::Default => Value::None,
            },
            PortDirection::Output => self.pull(PortAddress::new(token.index, port))?,
            PortDirection::Enter | PortDirection::Exit => Value::None,
        };

        Ok(if value.is_none() {
            compiled.default.clone()
        } else {
            value
        })
    }

    fn pull(&mut self, source: PortAddress) -> Result<Value, FlowError> {
        let graph = self.graph.clone();
        let Some(node) = graph.node(source.node) else {
            return Ok(Value::None);
        };
        let token = self.token_at(source.node);
        self.nested(|bp| node.behavior().port_value(bp, token, source.port))
    }

    // -- Host surface --

    /// Deliver a host tick to every node subscribed to [`Subscription::Tick`],
    /// then forward exits that attached runners fired since the last tick.
    ///
    /// Every subscriber runs even if an earlier one fails; the first fault is
    /// returned.
    pub fn tick(&mut self, delta: f32) -> Result<(), FlowError> {
        self.expect_state(&[InstanceState::Running], "Running")?;
        let ticked = self.dispatch(Subscription::Tick, |behavior, bp, token| behavior.on_tick(bp, token, delta));
        let polled = if self.state == InstanceState::Running {
            self.poll_runners()
        } else {
            Ok(())
        };
        ticked.and(polled)
    }

    /// Deliver a host lifecycle event to its subscribers
    pub fn notify(&mut self, event: HostEvent) -> Result<(), FlowError> {
        self.expect_live()?;
        self.dispatch(Subscription::Host(event), |behavior, bp, token| {
            behavior.on_host_event(bp, token, event)
        })
    }

    fn dispatch(
        &mut self,
        kind: Subscription,
        mut call: impl FnMut(&dyn NodeBehavior, &mut Self, NodeToken) -> Result<(), FlowError>,
    ) -> Result<(), FlowError> {
        let graph = self.graph.clone();
        self.nested(|bp| {
            // Entries added while dispatching wait for the next round
            let len = bp.subscriptions.len();
            let mut first_error = None;
            for index in 0..len {
                if bp.state == InstanceState::DeInitialized {
                    break;
                }
                let Some(&Some((token, subscription))) = bp.subscriptions.get(index) else {
                    continue;
                };
                if subscription != kind {
                    continue;
                }
                let Some(node) = graph.node(token.index) else {
                    continue;
                };
                if let Err(err) = call(node.behavior().as_ref(), bp, token) {
                    tracing::debug!("Subscriber {} failed on {:?}: {}", node.id, kind, err);
                    first_error.get_or_insert(err);
                }
            }
            first_error.map_or(Ok(()), Err)
        })
    }

    /// Subscribe a node to a host notification. Subscribing twice is a no-op.
    pub fn subscribe(&mut self, token: NodeToken, subscription: Subscription) -> Result<(), FlowError> {
        self.check_token(token)?;
        if !self.is_subscribed(token, subscription) {
            self.subscriptions.push(Some((token, subscription)));
        }
        Ok(())
    }

    /// Remove a subscription. Safe to call from inside the notification
    /// being delivered.
    pub fn unsubscribe(&mut self, token: NodeToken, subscription: Subscription) -> Result<(), FlowError> {
        self.check_token(token)?;
        for entry in &mut self.subscriptions {
            if *entry == Some((token, subscription)) {
                *entry = None;
            }
        }
        if self.depth == 0 {
            self.compact_subscriptions();
        }
        Ok(())
    }

    /// Whether a node is subscribed to a notification
    pub fn is_subscribed(&self, token: NodeToken, subscription: Subscription) -> bool {
        self.subscriptions.contains(&Some((token, subscription)))
    }

    /// Live subscriptions in delivery order
    pub fn subscriptions(&self) -> impl Iterator<Item = (NodeToken, Subscription)> + '_ {
        self.subscriptions.iter().flatten().copied()
    }

    fn compact_subscriptions(&mut self) {
        self.subscriptions.retain(Option::is_some);
    }

    // -- Node state --

    /// Per-instance state of a node, if it has been created
    pub fn state<S: 'static>(&self, token: NodeToken) -> Option<&S> {
        self.check_token(token).ok()?;
        self.node_state.get(token.index)?.as_deref()?.downcast_ref::<S>()
    }

    /// Per-instance state of a node, created with `Default` on first use
    pub fn state_mut<S: Default + 'static>(&mut self, token: NodeToken) -> Result<&mut S, FlowError> {
        self.check_token(token)?;
        let slot = self.node_state.get_mut(token.index).ok_or(FlowError::StaleToken)?;
        if !slot.as_deref().is_some_and(|state| state.is::<S>()) {
            *slot = Some(Box::new(S::default()));
        }
        slot.as_deref_mut()
            .and_then(|state| state.downcast_mut::<S>())
            .ok_or(FlowError::StaleToken)
    }

    // -- Boundary surface --

    /// Top-level boundary pins
    pub fn boundary_ports(&self) -> &[BoundaryPort] {
        self.graph.boundary_ports()
    }

    fn boundary(&self, name: &str, direction: PortDirection) -> Result<BoundaryPort, FlowError> {
        self.graph
            .boundary_port(name, direction)
            .cloned()
            .ok_or_else(|| FlowError::UnknownBoundary(name.to_string()))
    }

    /// Fire a top-level Enter pin
    pub fn fire_boundary(&mut self, name: &str) -> Result<(), FlowError> {
        let pin = self.boundary(name, PortDirection::Enter)?;
        for stub in pin.stubs.iter() {
            let token = self.token_at(stub.node);
            self.fire(token, stub.port)?;
        }
        Ok(())
    }

    /// Read a top-level Output pin as `T`
    pub fn read_boundary<T: PortData>(&mut self, name: &str) -> Result<T, FlowError> {
        let value = self.read_boundary_value(name)?;
        Ok(resolve_or_default(value, Value::None))
    }

    /// Read a top-level Output pin as a raw [`Value`]
    pub fn read_boundary_value(&mut self, name: &str) -> Result<Value, FlowError> {
        let pin = self.boundary(name, PortDirection::Output)?;
        match pin.stubs.first() {
            Some(stub) => {
                let token = self.token_at(stub.node);
                self.read_value(token, stub.port)
            }
            None => Ok(Value::None),
        }
    }

    /// Set the value a top-level Input pin reads
    pub fn set_boundary_input(&mut self, name: &str, value: Value) -> Result<(), FlowError> {
        self.boundary(name, PortDirection::Input)?;
        self.boundary_inputs.insert(name.to_string(), value);
        Ok(())
    }

    /// Value last set on a top-level Input pin
    pub fn boundary_input(&self, name: &str) -> Option<&Value> {
        self.boundary_inputs.get(name)
    }

    /// Record that a top-level Exit pin fired
    pub fn exit_boundary(&mut self, name: &str) {
        tracing::trace!("Boundary exit {:?} fired in {:?}", name, self.graph.name());
        self.boundary_exits.push(name.to_string());
    }

    /// Drain the top-level Exit pins fired since the last call, in order
    pub fn take_boundary_exits(&mut self) -> Vec<String> {
        std::mem::take(&mut self.boundary_exits)
    }
}

impl Drop for Blueprint {
    fn drop(&mut self) {
        self.deinitialize();
    }
}

/// Convert a read value, falling back to the port default and then to
/// `T::default()`
fn resolve_or_default<T: PortData>(value: Value, default: Value) -> T {
    T::from_value(value)
        .or_else(|| T::from_value(default))
        .unwrap_or_default()
}
