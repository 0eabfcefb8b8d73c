// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::errors::{ExecutionError, FlowFailure, RollbackSummary};
use crate::graph::CompiledFlow;

use super::scheduler::{FlowEngine, FlowInput, FlowOutput};

/// Entry point for running one compiled flow.
///
/// Each call runs on its own task, so an execution (rollback included) runs
/// to the end even when the caller stops waiting for it. [`FlowManager::wait`]
/// blocks until every execution started through this manager has finished.
#[derive(Debug, Clone)]
pub struct FlowManager {
    flow: Arc<CompiledFlow>,
    engine: Arc<FlowEngine>,
    tracker: TaskTracker,
}

impl FlowManager {
    pub fn new(flow: Arc<CompiledFlow>, engine: Arc<FlowEngine>) -> Self {
        Self {
            flow,
            engine,
            tracker: TaskTracker::new(),
        }
    }

    pub fn flow(&self) -> &Arc<CompiledFlow> {
        &self.flow
    }

    pub async fn call(&self, input: FlowInput) -> Result<FlowOutput, FlowFailure> {
        self.call_with_cancellation(input, CancellationToken::new())
            .await
    }

    pub async fn call_with_cancellation(
        &self,
        input: FlowInput,
        cancel: CancellationToken,
    ) -> Result<FlowOutput, FlowFailure> {
        let engine = self.engine.clone();
        let flow = self.flow.clone();
        let handle = self.tracker.spawn(async move {
            engine.execute_with_cancellation(flow, input, cancel).await
        });

        match handle.await {
            Ok(result) => result,
            Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
            Err(_) => Err(FlowFailure {
                flow: self.flow.name().to_string(),
                primary: ExecutionError::Cancelled,
                rollback: RollbackSummary::default(),
                secondary: Vec::new(),
                states: Default::default(),
            }),
        }
    }

    /// Waits for every in-flight execution of this manager, rollbacks included.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Number of executions currently running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}
