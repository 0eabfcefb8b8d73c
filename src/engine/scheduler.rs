// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Branch scheduler: runs one compiled flow per execution.
//!
//! # Execution Flow
//!
//! 1. **Seed**: the input body and header are written to the store and every
//!    node without dependencies becomes ready.
//! 2. **Admit**: ready nodes are taken in topological order. A node whose
//!    dependencies were all skipped is skipped too; a node with a condition
//!    is skipped when the condition is false. Everything else is spawned.
//! 3. **React**: each finished node reports back over a channel. Its
//!    dependents lose one outstanding dependency and become ready at zero.
//! 4. **Stop**: the first failure, a caller cancellation or the flow deadline
//!    stops admission. Running nodes get the drain grace to finish, then are
//!    cancelled.
//! 5. **Finish**: on failure the rollback log is sealed and compensated in
//!    reverse; otherwise the output is assembled from the store. A proxy
//!    response stream carries the sealed log with it and compensates if it
//!    breaks after the execution returned.
//!
//! Concurrency across every execution of one engine is bounded by a single
//! semaphore of `max_concurrency` permits, held only for the duration of a
//! node's call.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::conditions::evaluate;
use crate::config::EngineOptions;
use crate::errors::{ExecutionError, FlowFailure, RollbackSummary};
use crate::flow::{Metadata, Value};
use crate::graph::{CompiledFlow, NodeId};
use crate::observability::messages::engine::{
    DrainExpired, ExecutionCompleted, ExecutionFailed, ExecutionStarted, SchedulingStopped,
};
use crate::observability::messages::node::{NodeFailed, NodeSkipped, SkipReason};
use crate::observability::messages::StructuredLog;
use crate::references::{resolve_header, resolve_tree, Strictness};
use crate::traits::{Body, NodeObserver, NoopObserver};

use super::context::{ExecutionContext, NodeState};
use super::proxy::{ProxyForwarder, ProxyStream, StreamCompensation};
use super::rollback::RollbackCoordinator;
use super::worker::{NodeReport, NodeTask, ReportGuard};

/// Caller-supplied input of one execution.
#[derive(Default)]
pub struct FlowInput {
    pub header: Metadata,
    pub body: Value,
    /// Inbound byte stream for the flow's proxy node, if it has one.
    pub stream: Option<Body>,
}

impl FlowInput {
    pub fn new(body: Value) -> Self {
        Self {
            body,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.insert(key.into(), value.into());
        self
    }

    pub fn with_stream(mut self, stream: Body) -> Self {
        self.stream = Some(stream);
        self
    }
}

impl fmt::Debug for FlowInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowInput")
            .field("header", &self.header)
            .field("body", &self.body)
            .field("stream", &self.stream.is_some())
            .finish()
    }
}

/// Result of a successful execution.
pub struct FlowOutput {
    pub header: Metadata,
    pub body: Value,
    /// Response stream of the proxy node, if the flow has one.
    pub stream: Option<Body>,
    /// Terminal state of every node, keyed by node name.
    pub states: BTreeMap<String, NodeState>,
}

impl fmt::Debug for FlowOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowOutput")
            .field("header", &self.header)
            .field("body", &self.body)
            .field("stream", &self.stream.is_some())
            .field("states", &self.states)
            .finish()
    }
}

/// Aborts every node task still alive when an execution is dropped.
#[derive(Default)]
struct Workers(Vec<JoinHandle<()>>);

impl Drop for Workers {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

pub struct FlowEngine {
    options: EngineOptions,
    semaphore: Arc<Semaphore>,
    observer: Arc<dyn NodeObserver>,
    forwarder: ProxyForwarder,
}

impl FlowEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(options.max_concurrency())),
            forwarder: ProxyForwarder::new(options.proxy_window()),
            observer: Arc::new(NoopObserver),
            options,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn NodeObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub async fn execute(
        &self,
        flow: Arc<CompiledFlow>,
        input: FlowInput,
    ) -> Result<FlowOutput, FlowFailure> {
        self.execute_with_cancellation(flow, input, CancellationToken::new())
            .await
    }

    /// Runs one execution. Cancelling `cancel` stops admission and drains
    /// running nodes before rolling back.
    pub async fn execute_with_cancellation(
        &self,
        flow: Arc<CompiledFlow>,
        input: FlowInput,
        cancel: CancellationToken,
    ) -> Result<FlowOutput, FlowFailure> {
        let started = Instant::now();
        let announcement = ExecutionStarted {
            flow: flow.name(),
            node_count: flow.nodes().len(),
            max_concurrency: self.options.max_concurrency(),
        };
        announcement.log();
        let span = announcement.span("execute");

        let mut context =
            match ExecutionContext::new(flow.clone(), input.header, input.body, input.stream) {
                Ok(context) => context,
                Err(error) => {
                    return Err(FlowFailure {
                        flow: flow.name().to_string(),
                        primary: error,
                        rollback: RollbackSummary::default(),
                        secondary: Vec::new(),
                        states: BTreeMap::new(),
                    })
                }
            };

        let stop = self.run(&mut context, &cancel).instrument(span).await;

        match context.take_failure(stop) {
            Some((primary, secondary)) => {
                let entries = context.seal_rollback();
                let store = context.store().clone();
                let rollback = self.coordinator().compensate(&flow, entries, &store).await;

                ExecutionFailed {
                    flow: flow.name(),
                    error: &primary,
                    rollback: &rollback,
                    duration: started.elapsed(),
                }
                .log();

                Err(FlowFailure {
                    flow: flow.name().to_string(),
                    primary,
                    rollback,
                    secondary,
                    states: context.states(),
                })
            }
            None => {
                let output = flow.output();
                let body = resolve_tree(&output.body, context.store(), Strictness::Lenient)
                    .unwrap_or(Value::Null);
                let header = resolve_header(&output.header, context.store());

                ExecutionCompleted {
                    flow: flow.name(),
                    completed: context.count(NodeState::Completed),
                    skipped: context.count(NodeState::Skipped),
                    duration: started.elapsed(),
                }
                .log();

                // The rollback log stays with the response stream: a proxy
                // response that breaks later still fails the execution.
                let stream = match (context.take_outbound(), flow.proxy()) {
                    (Some(inner), Some(proxy)) => {
                        let compensation = StreamCompensation {
                            flow: flow.clone(),
                            node: proxy.name.clone(),
                            entries: context.seal_rollback(),
                            store: context.store().clone(),
                            coordinator: self.coordinator(),
                            states: context.states(),
                            started,
                        };
                        Some(Box::pin(ProxyStream::new(inner, compensation)) as Body)
                    }
                    (inner, _) => inner,
                };

                Ok(FlowOutput {
                    header,
                    body,
                    stream,
                    states: context.states(),
                })
            }
        }
    }

    fn coordinator(&self) -> RollbackCoordinator {
        RollbackCoordinator::new(self.observer.clone(), self.options.node_timeout())
    }

    /// Drives the execution until no node is running and nothing more can be
    /// admitted. Returns the interruption that stopped it, if any.
    async fn run(
        &self,
        context: &mut ExecutionContext,
        cancel: &CancellationToken,
    ) -> Option<ExecutionError> {
        let flow = context.flow().clone();
        let (tx, mut rx) = mpsc::unbounded_channel::<NodeReport>();
        let nodes_cancel = CancellationToken::new();
        let mut workers = Workers::default();

        let deadline = self.options.flow_deadline().map(|after| (Instant::now() + after, after));
        let mut stop: Option<ExecutionError> = None;
        let mut stopped = false;
        let mut drain_until: Option<Instant> = None;
        let mut running = 0usize;

        loop {
            if !stopped {
                if cancel.is_cancelled() {
                    stop = Some(ExecutionError::Cancelled);
                } else if let Some((at, after)) = deadline {
                    if Instant::now() >= at {
                        stop = Some(ExecutionError::DeadlineExceeded { after });
                    }
                }
            }

            if !stopped && stop.is_none() && !context.has_failed() {
                while let Some(id) = context.next_ready() {
                    if self.admit(context, id) {
                        self.spawn(context, id, &tx, &nodes_cancel, &mut workers);
                        running += 1;
                    }
                    if context.has_failed() {
                        break;
                    }
                }
            }

            if !stopped && (stop.is_some() || context.has_failed()) {
                stopped = true;
                drain_until = Some(Instant::now() + self.options.drain_grace());
                if let Some(reason) = stop.as_ref().or_else(|| context.first_failure()) {
                    SchedulingStopped {
                        flow: flow.name(),
                        reason,
                        running,
                        grace: self.options.drain_grace(),
                    }
                    .log();
                }
            }

            if running == 0 {
                break;
            }

            let deadline_at = deadline.map_or_else(Instant::now, |(at, _)| at);
            let drain_at = drain_until.unwrap_or_else(Instant::now);

            tokio::select! {
                Some(report) = rx.recv() => {
                    running -= 1;
                    self.finish(context, report);
                }
                _ = cancel.cancelled(), if !stopped => {
                    stop = Some(ExecutionError::Cancelled);
                }
                _ = tokio::time::sleep_until(deadline_at), if !stopped && deadline.is_some() => {
                    stop = deadline.map(|(_, after)| ExecutionError::DeadlineExceeded { after });
                }
                _ = tokio::time::sleep_until(drain_at), if drain_until.is_some() && !nodes_cancel.is_cancelled() => {
                    DrainExpired {
                        flow: flow.name(),
                        abandoned: running,
                    }
                    .log();
                    nodes_cancel.cancel();
                }
                else => break,
            }
        }

        stop
    }

    /// Decides whether a ready node runs. Skips and condition failures are
    /// applied here and `false` is returned.
    fn admit(&self, context: &mut ExecutionContext, id: NodeId) -> bool {
        let flow = context.flow().clone();
        let Some(node) = flow.node(id) else {
            return false;
        };

        let reason = if context.dependencies_all_skipped(id) {
            Some(SkipReason::Cascade)
        } else if let Some(condition) = &node.condition {
            match evaluate(condition, context.store()) {
                Ok(true) => None,
                Ok(false) => Some(SkipReason::Condition),
                Err(error) => {
                    let error = ExecutionError::Condition {
                        node: node.name.clone(),
                        message: error.to_string(),
                    };
                    self.fail(context, id, error);
                    return false;
                }
            }
        } else {
            None
        };

        let Some(reason) = reason else {
            return true;
        };

        NodeSkipped {
            flow: flow.name(),
            node: &node.name,
            reason,
        }
        .log();
        if let Err(error) = context.skip(id) {
            self.fail(context, id, error);
        } else {
            self.observer.after_node(flow.name(), &node.name, NodeState::Skipped);
        }
        false
    }

    fn spawn(
        &self,
        context: &mut ExecutionContext,
        id: NodeId,
        tx: &mpsc::UnboundedSender<NodeReport>,
        cancel: &CancellationToken,
        workers: &mut Workers,
    ) {
        let flow = context.flow().clone();
        let Some(node) = flow.node(id) else {
            return;
        };

        context.mark_running(id);
        let inbound = if node.is_proxy() {
            context.take_inbound()
        } else {
            None
        };

        let task = NodeTask {
            flow: flow.clone(),
            node: id,
            store: context.store().clone(),
            semaphore: self.semaphore.clone(),
            cancel: cancel.clone(),
            timeout: node.timeout().unwrap_or_else(|| self.options.node_timeout()),
            inbound,
            forwarder: self.forwarder,
            observer: self.observer.clone(),
        };
        let guard = ReportGuard::new(id, &node.name, tx.clone());

        workers.0.push(tokio::spawn(async move {
            let outcome = task.run().await;
            guard.send(outcome);
        }));
    }

    fn finish(&self, context: &mut ExecutionContext, report: NodeReport) {
        let flow = context.flow().clone();
        let Some(node) = flow.node(report.node) else {
            return;
        };

        match report.outcome {
            Ok(completion) => {
                context.complete(report.node, completion.rollback, completion.stream);
                self.observer.after_node(flow.name(), &node.name, NodeState::Completed);
            }
            Err(error) => self.fail(context, report.node, error),
        }
    }

    fn fail(&self, context: &mut ExecutionContext, id: NodeId, error: ExecutionError) {
        let flow = context.flow().clone();
        if let Some(node) = flow.node(id) {
            NodeFailed {
                flow: flow.name(),
                node: &node.name,
                error: &error,
            }
            .log();
            self.observer.after_node(flow.name(), &node.name, NodeState::Failed);
        }
        context.fail(id, error);
    }
}

impl fmt::Debug for FlowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowEngine")
            .field("options", &self.options)
            .field("available_permits", &self.semaphore.available_permits())
            .finish()
    }
}
