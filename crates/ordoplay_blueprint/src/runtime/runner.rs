// SPDX-License-Identifier: MIT OR Apache-2.0
//! External runners: separately running instances a compound node proxies to
//! instead of being flattened.

use super::{Blueprint, FlowError, InstanceState, NodeToken};
use crate::behavior::SubgraphMode;
use crate::port::PortDirection;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

impl Blueprint {
    /// Attach a running instance under `id` for compound nodes in
    /// external-runner mode. Replaces any runner already attached there.
    pub fn attach_runner(&mut self, id: impl Into<String>, runner: Rc<RefCell<Blueprint>>) {
        let id = id.into();
        tracing::debug!("Attached runner {:?} to {:?}", id, self.graph.name());
        self.runners.insert(id, runner);
    }

    /// Detach a runner
    pub fn detach_runner(&mut self, id: &str) -> Option<Rc<RefCell<Blueprint>>> {
        self.runners.remove(id)
    }

    /// Runner attached under `id`
    pub fn runner(&self, id: &str) -> Option<Rc<RefCell<Blueprint>>> {
        self.runners.get(id).cloned()
    }

    /// Values of the node's Input ports, by port name
    fn proxy_inputs(&mut self, token: NodeToken) -> Result<Vec<(String, Value)>, FlowError> {
        let graph = self.graph.clone();
        let Some(node) = graph.node(token.index) else {
            return Ok(Vec::new());
        };
        let mut inputs = Vec::new();
        for (index, port) in node.ports.iter().enumerate() {
            if port.port.direction == PortDirection::Input {
                inputs.push((port.port.name.clone(), self.read_value(token, index)?));
            }
        }
        Ok(inputs)
    }

    fn borrow_runner(&self, id: &str) -> Result<Rc<RefCell<Blueprint>>, FlowError> {
        self.runner(id).ok_or_else(|| FlowError::MissingRunner(id.to_string()))
    }

    /// Compiled nodes proxying to the runner attached under `id`
    fn bound_to(&self, id: &str) -> Vec<usize> {
        self.graph
            .nodes()
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                matches!(
                    node.behavior().subgraph().map(|s| &s.mode),
                    Some(SubgraphMode::External { runner }) if runner == id
                )
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// Fire the matching Exit port on every compound node bound to `id` for
    /// each exit the runner recorded outside a proxied enter. A busy or
    /// missing runner is left for the next poll.
    fn deliver_runner_exits(&mut self, id: &str) -> Result<(), FlowError> {
        let Some(runner) = self.runner(id) else {
            return Ok(());
        };
        let exits = match runner.try_borrow_mut() {
            Ok(mut inner) => inner.take_boundary_exits(),
            Err(_) => return Ok(()),
        };
        if exits.is_empty() {
            return Ok(());
        }

        let graph = self.graph.clone();
        let bound = self.bound_to(id);
        for exit in &exits {
            tracing::trace!("Runner {:?} exit {:?} delivered late", id, exit);
            for &index in &bound {
                let Some(port) = graph.node(index).and_then(|n| n.port_index(exit, PortDirection::Exit)) else {
                    continue;
                };
                let token = self.token_at(index);
                self.fire(token, port)?;
            }
        }
        Ok(())
    }

    /// Forward pending exits of every attached runner, in runner id order.
    ///
    /// Every runner is polled even if an earlier one fails; the first fault
    /// is returned.
    pub(super) fn poll_runners(&mut self) -> Result<(), FlowError> {
        let mut ids: Vec<String> = self.runners.keys().cloned().collect();
        ids.sort();

        let mut first_error = None;
        for id in ids {
            if self.state != InstanceState::Running {
                break;
            }
            if let Err(err) = self.deliver_runner_exits(&id) {
                tracing::debug!("Runner {:?} exits failed: {}", id, err);
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Forward an Enter port of a compound node to its runner, then fire
    /// the node's Exit ports matching the runner's boundary exits.
    ///
    /// Exits the runner fired earlier on its own are delivered first, so
    /// they are never mistaken for a result of this enter.
    pub(crate) fn proxy_enter(&mut self, id: &str, token: NodeToken, port: usize) -> Result<(), FlowError> {
        let graph = self.graph.clone();
        let Some(node) = graph.node(token.index) else {
            return Ok(());
        };
        let Some(name) = node.port(port).map(|p| p.port.name.as_str()) else {
            return Ok(());
        };

        self.deliver_runner_exits(id)?;
        let inputs = self.proxy_inputs(token)?;
        let runner = self.borrow_runner(id)?;
        let exits = {
            let mut inner = runner
                .try_borrow_mut()
                .map_err(|_| FlowError::RunnerBusy(id.to_string()))?;
            let wrap = |source: FlowError| FlowError::Runner {
                id: id.to_string(),
                source: Box::new(source),
            };
            for (input, value) in inputs {
                inner.set_boundary_input(&input, value).map_err(wrap)?;
            }
            inner.fire_boundary(name).map_err(wrap)?;
            inner.take_boundary_exits()
        };

        for exit in exits {
            if let Some(index) = node.port_index(&exit, PortDirection::Exit) {
                self.fire(token, index)?;
            }
        }
        Ok(())
    }

    /// Read an Output port of a compound node from its runner
    pub(crate) fn proxy_read(&mut self, id: &str, token: NodeToken, port: usize) -> Result<Value, FlowError> {
        let graph = self.graph.clone();
        let Some(name) = graph
            .node(token.index)
            .and_then(|n| n.port(port))
            .map(|p| p.port.name.as_str())
        else {
            return Ok(Value::None);
        };

        let inputs = self.proxy_inputs(token)?;
        let runner = self.borrow_runner(id)?;
        let mut inner = runner
            .try_borrow_mut()
            .map_err(|_| FlowError::RunnerBusy(id.to_string()))?;
        let wrap = |source: FlowError| FlowError::Runner {
            id: id.to_string(),
            source: Box::new(source),
        };
        for (input, value) in inputs {
            inner.set_boundary_input(&input, value).map_err(wrap)?;
        }
        inner.read_boundary_value(name).map_err(wrap)
    }
}
