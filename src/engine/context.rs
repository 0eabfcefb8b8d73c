// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::Arc;

use crate::errors::ExecutionError;
use crate::flow::{Metadata, Value};
use crate::graph::{CompiledFlow, NodeId};
use crate::references::{header_resource, ReferenceStore, INPUT_RESOURCE};
use crate::traits::Body;

use super::rollback::{RollbackEntry, RollbackLog};

/// Lifecycle of a node within one execution.
///
/// `Pending -> Ready -> Running -> Completed | Failed`, or `Ready -> Skipped`.
/// Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeState::Completed | NodeState::Failed | NodeState::Skipped
        )
    }
}

/// Mutable state of a single execution.
///
/// Owned by the scheduler loop; workers only see the shared store.
pub(crate) struct ExecutionContext {
    flow: Arc<CompiledFlow>,
    store: Arc<ReferenceStore>,
    states: Vec<NodeState>,
    waiting_on: Vec<usize>,
    ready: BinaryHeap<Reverse<(usize, NodeId)>>,
    rollback: RollbackLog,
    failures: Vec<(usize, ExecutionError)>,
    inbound: Option<Body>,
    outbound: Option<Body>,
}

impl ExecutionContext {
    /// Seeds the store with the flow input and queues every root node.
    pub fn new(
        flow: Arc<CompiledFlow>,
        header: Metadata,
        body: Value,
        inbound: Option<Body>,
    ) -> Result<Self, ExecutionError> {
        let store = Arc::new(ReferenceStore::new(flow.resources()));
        store.store(INPUT_RESOURCE, body)?;
        let header = header
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();
        store.store(&header_resource(INPUT_RESOURCE), Value::Object(header))?;

        let count = flow.nodes().len();
        let waiting_on: Vec<usize> = flow.nodes().iter().map(|n| n.dependencies.len()).collect();

        let mut context = Self {
            flow,
            store,
            states: vec![NodeState::Pending; count],
            waiting_on,
            ready: BinaryHeap::new(),
            rollback: RollbackLog::new(),
            failures: Vec::new(),
            inbound,
            outbound: None,
        };

        for id in 0..count {
            if context.waiting_on[id] == 0 {
                context.mark_ready(id);
            }
        }

        Ok(context)
    }

    pub fn flow(&self) -> &Arc<CompiledFlow> {
        &self.flow
    }

    pub fn store(&self) -> &Arc<ReferenceStore> {
        &self.store
    }

    pub fn state(&self, id: NodeId) -> NodeState {
        self.states.get(id).copied().unwrap_or(NodeState::Pending)
    }

    /// Next ready node in topological order.
    pub fn next_ready(&mut self) -> Option<NodeId> {
        self.ready.pop().map(|Reverse((_, id))| id)
    }

    /// True when the node has dependencies and every one of them was skipped.
    /// The flow input is not a node, so reading it never keeps a node alive.
    pub fn dependencies_all_skipped(&self, id: NodeId) -> bool {
        self.flow.node(id).is_some_and(|node| {
            !node.dependencies.is_empty()
                && node
                    .dependencies
                    .iter()
                    .all(|&dependency| self.state(dependency) == NodeState::Skipped)
        })
    }

    pub fn mark_running(&mut self, id: NodeId) {
        self.states[id] = NodeState::Running;
    }

    pub fn complete(&mut self, id: NodeId, rollback: Option<RollbackEntry>, stream: Option<Body>) {
        self.states[id] = NodeState::Completed;
        if let Some(entry) = rollback {
            self.rollback.record(entry);
        }
        if stream.is_some() {
            self.outbound = stream;
        }
        self.release(id);
    }

    /// Marks the node skipped and makes its resources permanently absent.
    pub fn skip(&mut self, id: NodeId) -> Result<(), ExecutionError> {
        self.states[id] = NodeState::Skipped;
        if let Some(node) = self.flow.node(id) {
            self.store.skip(&node.name)?;
            if let Some(header) = node.header_resource() {
                self.store.skip(&header)?;
            }
        }
        self.release(id);
        Ok(())
    }

    pub fn fail(&mut self, id: NodeId, error: ExecutionError) {
        self.states[id] = NodeState::Failed;
        self.failures.push((self.flow.position(id), error));
    }

    pub fn has_failed(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn first_failure(&self) -> Option<&ExecutionError> {
        self.failures.first().map(|(_, error)| error)
    }

    pub fn take_inbound(&mut self) -> Option<Body> {
        self.inbound.take()
    }

    pub fn take_outbound(&mut self) -> Option<Body> {
        self.outbound.take()
    }

    pub fn seal_rollback(&mut self) -> Vec<RollbackEntry> {
        self.rollback.seal()
    }

    pub fn count(&self, state: NodeState) -> usize {
        self.states.iter().filter(|&&s| s == state).count()
    }

    /// Reported state of every node. A node that became ready but was never
    /// admitted reports `Pending`: it never ran.
    pub fn states(&self) -> BTreeMap<String, NodeState> {
        self.flow
            .nodes()
            .iter()
            .map(|node| {
                let state = match self.state(node.id) {
                    NodeState::Ready => NodeState::Pending,
                    other => other,
                };
                (node.name.clone(), state)
            })
            .collect()
    }

    /// Picks the error that decides the execution and returns it with the rest.
    ///
    /// The earliest node failure in topological order wins, unless every node
    /// failure is itself a consequence of `stop` (a drained cancellation), in
    /// which case `stop` is primary.
    pub fn take_failure(
        &mut self,
        stop: Option<ExecutionError>,
    ) -> Option<(ExecutionError, Vec<ExecutionError>)> {
        let mut failures = std::mem::take(&mut self.failures);
        failures.sort_by_key(|(position, error)| (error.is_interruption(), *position));

        let mut errors = failures.into_iter().map(|(_, error)| error);
        match (errors.next(), stop) {
            (Some(first), Some(stop)) if first.is_interruption() => {
                let mut secondary = vec![first];
                secondary.extend(errors);
                Some((stop, secondary))
            }
            (Some(first), _) => Some((first, errors.collect())),
            (None, Some(stop)) => Some((stop, Vec::new())),
            (None, None) => None,
        }
    }

    fn mark_ready(&mut self, id: NodeId) {
        self.states[id] = NodeState::Ready;
        self.ready.push(Reverse((self.flow.position(id), id)));
    }

    fn release(&mut self, id: NodeId) {
        let Some(node) = self.flow.node(id) else {
            return;
        };
        let dependents = node.dependents.clone();
        for dependent in dependents {
            let waiting = &mut self.waiting_on[dependent];
            *waiting = waiting.saturating_sub(1);
            if *waiting == 0 && self.states[dependent] == NodeState::Pending {
                self.mark_ready(dependent);
            }
        }
    }
}
