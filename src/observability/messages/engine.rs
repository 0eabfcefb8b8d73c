// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the execution lifecycle of a flow.
//!
//! This module contains message types for logging events related to:
//! * Execution start and completion
//! * Failure, cancellation and deadline handling
//! * Draining of in-flight nodes after a stop

use std::fmt::{Display, Formatter};
use std::time::Duration;

use tracing::Span;

use crate::errors::{ExecutionError, RollbackSummary};
use crate::observability::messages::StructuredLog;

/// Execution of a flow started.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_switchyard::observability::messages::engine::ExecutionStarted;
///
/// let msg = ExecutionStarted {
///     flow: "checkout",
///     node_count: 5,
///     max_concurrency: 4,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ExecutionStarted<'a> {
    pub flow: &'a str,
    pub node_count: usize,
    pub max_concurrency: usize,
}

impl Display for ExecutionStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Executing flow '{}': {} nodes, max_concurrency={}",
            self.flow, self.node_count, self.max_concurrency
        )
    }
}

impl StructuredLog for ExecutionStarted<'_> {
    fn log(&self) {
        tracing::info!(
            flow = self.flow,
            node_count = self.node_count,
            max_concurrency = self.max_concurrency,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "execution",
            span_name = name,
            flow = self.flow,
            node_count = self.node_count,
            max_concurrency = self.max_concurrency,
        )
    }
}

/// Execution completed and the output was assembled.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ExecutionCompleted<'a> {
    pub flow: &'a str,
    pub completed: usize,
    pub skipped: usize,
    pub duration: Duration,
}

impl Display for ExecutionCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Flow '{}' completed: {} nodes ran, {} skipped in {:?}",
            self.flow, self.completed, self.skipped, self.duration
        )
    }
}

impl StructuredLog for ExecutionCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            flow = self.flow,
            completed = self.completed,
            skipped = self.skipped,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "execution_completed",
            span_name = name,
            flow = self.flow,
            duration = ?self.duration,
        )
    }
}

/// Execution failed; rollback has already run.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ExecutionFailed<'a> {
    pub flow: &'a str,
    pub error: &'a ExecutionError,
    pub rollback: &'a RollbackSummary,
    pub duration: Duration,
}

impl Display for ExecutionFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Flow '{}' failed after {:?}: {} (rollback: {})",
            self.flow, self.duration, self.error, self.rollback
        )
    }
}

impl StructuredLog for ExecutionFailed<'_> {
    fn log(&self) {
        tracing::error!(
            flow = self.flow,
            node = self.error.node(),
            error = %self.error,
            compensated = self.rollback.compensated.len(),
            compensation_failures = self.rollback.failures.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "execution_failed",
            span_name = name,
            flow = self.flow,
            error = %self.error,
        )
    }
}

/// Scheduling stopped; in-flight nodes are being drained.
///
/// # Log Level
/// `warn!` - Execution is winding down early
pub struct SchedulingStopped<'a> {
    pub flow: &'a str,
    pub reason: &'a ExecutionError,
    pub running: usize,
    pub grace: Duration,
}

impl Display for SchedulingStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Flow '{}' stopped scheduling ({}); draining {} running node(s) for up to {:?}",
            self.flow, self.reason, self.running, self.grace
        )
    }
}

impl StructuredLog for SchedulingStopped<'_> {
    fn log(&self) {
        tracing::warn!(
            flow = self.flow,
            reason = %self.reason,
            running = self.running,
            grace_ms = self.grace.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "scheduling_stopped",
            span_name = name,
            flow = self.flow,
            running = self.running,
        )
    }
}

/// Grace period elapsed with nodes still running; they were cancelled.
///
/// # Log Level
/// `warn!` - Nodes abandoned mid-call
pub struct DrainExpired<'a> {
    pub flow: &'a str,
    pub abandoned: usize,
}

impl Display for DrainExpired<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Flow '{}' drain grace expired: cancelling {} node(s)",
            self.flow, self.abandoned
        )
    }
}

impl StructuredLog for DrainExpired<'_> {
    fn log(&self) {
        tracing::warn!(flow = self.flow, abandoned = self.abandoned, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("drain_expired", span_name = name, flow = self.flow)
    }
}
