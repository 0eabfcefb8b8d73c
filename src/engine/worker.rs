// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Map;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::errors::{CallError, ExecutionError};
use crate::flow::{Metadata, Value};
use crate::graph::{CompiledFlow, CompiledNode, NodeId, NodeKind};
use crate::observability::messages::node::{NodeCompleted, NodeStarted};
use crate::observability::messages::StructuredLog;
use crate::references::{
    resolve_header, resolve_template, resolve_tree, MissingValue, ReferenceStore, Strictness,
};
use crate::traits::{Body, Exchange, NodeObserver, Request, Response};

use super::proxy::ProxyForwarder;
use super::rollback::RollbackEntry;

/// What a finished node hands back to the scheduler.
pub(crate) struct Completion {
    pub rollback: Option<RollbackEntry>,
    pub stream: Option<Body>,
}

pub(crate) struct NodeReport {
    pub node: NodeId,
    pub outcome: Result<Completion, ExecutionError>,
}

/// Everything a spawned node task needs. Cheap to build per node.
pub(crate) struct NodeTask {
    pub flow: Arc<CompiledFlow>,
    pub node: NodeId,
    pub store: Arc<ReferenceStore>,
    pub semaphore: Arc<Semaphore>,
    pub cancel: CancellationToken,
    pub timeout: Duration,
    pub inbound: Option<Body>,
    pub forwarder: ProxyForwarder,
    pub observer: Arc<dyn NodeObserver>,
}

/// Sends the node's report exactly once, even if the task is aborted or
/// panics before finishing.
pub(crate) struct ReportGuard {
    node: NodeId,
    name: String,
    tx: UnboundedSender<NodeReport>,
    sent: bool,
}

impl ReportGuard {
    pub fn new(node: NodeId, name: &str, tx: UnboundedSender<NodeReport>) -> Self {
        Self {
            node,
            name: name.to_string(),
            tx,
            sent: false,
        }
    }

    pub fn send(mut self, outcome: Result<Completion, ExecutionError>) {
        self.sent = true;
        let _ = self.tx.send(NodeReport {
            node: self.node,
            outcome,
        });
    }
}

impl Drop for ReportGuard {
    fn drop(&mut self) {
        if !self.sent {
            let _ = self.tx.send(NodeReport {
                node: self.node,
                outcome: Err(ExecutionError::Call {
                    node: std::mem::take(&mut self.name),
                    source: CallError::Cancelled,
                }),
            });
        }
    }
}

/// Outcome of the call itself, before anything is stored.
struct Called {
    request: Request,
    response: Response,
    stream: Option<Body>,
}

impl NodeTask {
    /// Waits for a concurrency permit, calls the node's target and stores the
    /// result. Cancellation is honoured both while waiting and while calling.
    pub async fn run(mut self) -> Result<Completion, ExecutionError> {
        let flow = self.flow.clone();
        let Some(node) = flow.node(self.node) else {
            return Err(ExecutionError::Cancelled);
        };
        let node_name = node.name.clone();
        let cancelled = || ExecutionError::Call {
            node: node_name.clone(),
            source: CallError::Cancelled,
        };

        let _permit = tokio::select! {
            permit = self.semaphore.clone().acquire_owned() => permit.map_err(|_| cancelled())?,
            _ = self.cancel.cancelled() => return Err(cancelled()),
        };

        let started = Instant::now();
        NodeStarted {
            flow: flow.name(),
            node: &node.name,
            target: node.target(),
        }
        .log();
        self.observer.before_node(flow.name(), &node.name);

        let timeout = self.timeout;
        let cancel = self.cancel.clone();
        let called = tokio::select! {
            result = tokio::time::timeout(timeout, self.call(node)) => {
                result.unwrap_or_else(|_| Err(ExecutionError::Call {
                    node: node.name.clone(),
                    source: CallError::Timeout { after: timeout },
                }))
            }
            _ = cancel.cancelled() => Err(cancelled()),
        }?;

        self.store.store(&node.name, called.response.body.clone())?;
        if let Some(header) = node.header_resource() {
            self.store.store(&header, header_object(&called.response.header))?;
        }

        NodeCompleted {
            flow: flow.name(),
            node: &node.name,
            duration: started.elapsed(),
        }
        .log();

        let rollback = node.rollback.as_ref().map(|_| RollbackEntry {
            node: node.id,
            exchange: Arc::new(Exchange {
                node: node.name.clone(),
                request: called.request,
                response: called.response,
            }),
        });

        Ok(Completion {
            rollback,
            stream: called.stream,
        })
    }

    async fn call(&mut self, node: &CompiledNode) -> Result<Called, ExecutionError> {
        let missing = |missing: MissingValue| ExecutionError::MissingReference {
            node: node.name.clone(),
            reference: missing.reference.to_string(),
        };
        let failed = |source: CallError| ExecutionError::Call {
            node: node.name.clone(),
            source,
        };

        match &node.kind {
            NodeKind::Resource {
                resource,
                header,
                proxy: true,
                ..
            } => {
                let header = resolve_header(header, &self.store);
                let inbound = self
                    .inbound
                    .take()
                    .unwrap_or_else(|| Box::pin(tokio::io::empty()));
                let forwarded = self
                    .forwarder
                    .forward(resource, header.clone(), inbound)
                    .await
                    .map_err(failed)?;

                Ok(Called {
                    request: Request {
                        header,
                        ..Request::default()
                    },
                    response: Response {
                        header: forwarded.header,
                        body: Value::Null,
                    },
                    stream: Some(forwarded.body),
                })
            }
            NodeKind::Resource {
                resource,
                request,
                header,
                ..
            } => {
                let request = Request {
                    header: resolve_header(header, &self.store),
                    body: resolve_tree(request, &self.store, Strictness::Strict).map_err(missing)?,
                    origin: None,
                };
                let response = resource.call(request.clone()).await.map_err(failed)?;
                Ok(Called {
                    request,
                    response,
                    stream: None,
                })
            }
            NodeKind::Function(call) => {
                let arguments = call
                    .arguments
                    .iter()
                    .map(|argument| resolve_template(argument, &self.store))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(missing)?;
                let request = Request::new(Value::Array(arguments));
                let response = node.capability().call(request.clone()).await.map_err(failed)?;
                Ok(Called {
                    request,
                    response,
                    stream: None,
                })
            }
        }
    }
}

fn header_object(header: &Metadata) -> Value {
    Value::Object(
        header
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect::<Map<String, Value>>(),
    )
}
