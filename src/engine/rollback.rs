// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Compensation of completed nodes after a failed execution.
//!
//! Every node that declares a rollback and completes successfully appends one
//! [`RollbackEntry`] to the execution's [`RollbackLog`]. When the execution
//! fails, the log is sealed and the [`RollbackCoordinator`] walks it in reverse
//! completion order, calling each node's compensating resource once. A failing
//! compensation is recorded and the sweep moves on.

use std::sync::Arc;
use std::time::Duration;

use crate::errors::{CallError, RollbackError, RollbackSummary};
use crate::graph::{CompiledFlow, NodeId};
use crate::observability::messages::rollback::{
    Compensated, CompensationFailed, RollbackFinished, RollbackStarted,
};
use crate::observability::messages::StructuredLog;
use crate::references::{resolve_header, resolve_tree, ReferenceStore, Strictness};
use crate::traits::{Exchange, NodeObserver, Request};

/// A completed node that can be compensated.
#[derive(Debug, Clone)]
pub struct RollbackEntry {
    pub node: NodeId,
    pub exchange: Arc<Exchange>,
}

/// Append-only record of compensable completions, in completion order.
#[derive(Debug, Default)]
pub struct RollbackLog {
    entries: Vec<RollbackEntry>,
    sealed: bool,
}

impl RollbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry. Returns `false` once the log has been sealed.
    pub fn record(&mut self, entry: RollbackEntry) -> bool {
        if self.sealed {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Closes the log and hands out its entries. A sealed log stays empty.
    pub fn seal(&mut self) -> Vec<RollbackEntry> {
        self.sealed = true;
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct RollbackCoordinator {
    observer: Arc<dyn NodeObserver>,
    call_timeout: Duration,
}

impl RollbackCoordinator {
    pub fn new(observer: Arc<dyn NodeObserver>, call_timeout: Duration) -> Self {
        Self {
            observer,
            call_timeout,
        }
    }

    /// Runs the compensating call of every entry, newest first.
    ///
    /// Without an explicit rollback request the original request body is
    /// replayed. Explicit requests are resolved strictly against the store;
    /// a missing value fails that compensation only.
    pub async fn compensate(
        &self,
        flow: &CompiledFlow,
        entries: Vec<RollbackEntry>,
        store: &ReferenceStore,
    ) -> RollbackSummary {
        let mut summary = RollbackSummary::default();
        if entries.is_empty() {
            return summary;
        }

        RollbackStarted {
            flow: flow.name(),
            entries: entries.len(),
        }
        .log();

        for entry in entries.into_iter().rev() {
            let Some(node) = flow.node(entry.node) else {
                continue;
            };
            let Some(rollback) = &node.rollback else {
                continue;
            };

            self.observer.before_rollback(flow.name(), &node.name);

            let body = match &rollback.request {
                Some(tree) => resolve_tree(tree, store, Strictness::Strict)
                    .map_err(|missing| CallError::failed(missing.to_string())),
                None => Ok(entry.exchange.request.body.clone()),
            };

            let result = match body {
                Ok(body) => {
                    let request = Request {
                        header: resolve_header(&rollback.header, store),
                        body,
                        origin: Some(entry.exchange.clone()),
                    };
                    tokio::time::timeout(self.call_timeout, rollback.resource.call(request))
                        .await
                        .unwrap_or(Err(CallError::Timeout {
                            after: self.call_timeout,
                        }))
                }
                Err(error) => Err(error),
            };

            let succeeded = result.is_ok();
            match result {
                Ok(_) => {
                    Compensated {
                        node: &node.name,
                        resource: rollback.resource.name(),
                    }
                    .log();
                    summary.compensated.push(node.name.clone());
                }
                Err(source) => {
                    let error = RollbackError {
                        node: node.name.clone(),
                        resource: rollback.resource.name().to_string(),
                        source,
                    };
                    CompensationFailed { error: &error }.log();
                    summary.failures.push(error);
                }
            }

            self.observer.after_rollback(flow.name(), &node.name, succeeded);
        }

        RollbackFinished {
            flow: flow.name(),
            summary: &summary,
        }
        .log();

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Response;
    use serde_json::json;

    fn entry(node: NodeId) -> RollbackEntry {
        RollbackEntry {
            node,
            exchange: Arc::new(Exchange {
                node: format!("n{node}"),
                request: Request::new(json!({ "n": node })),
                response: Response::default(),
            }),
        }
    }

    #[test]
    fn sealed_log_rejects_appends() {
        let mut log = RollbackLog::new();
        assert!(log.record(entry(0)));
        assert!(log.record(entry(1)));
        assert_eq!(log.len(), 2);

        let entries = log.seal();
        assert_eq!(entries.iter().map(|e| e.node).collect::<Vec<_>>(), vec![0, 1]);

        assert!(!log.record(entry(2)));
        assert!(log.is_empty());
        assert!(log.seal().is_empty());
    }
}
