// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for per-node events.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use tracing::Span;

use crate::errors::ExecutionError;
use crate::observability::messages::StructuredLog;

/// A node was handed to a worker.
///
/// # Log Level
/// `debug!` - Per-node detail
pub struct NodeStarted<'a> {
    pub flow: &'a str,
    pub node: &'a str,
    pub target: &'a str,
}

impl Display for NodeStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' calling '{}'", self.node, self.target)
    }
}

impl StructuredLog for NodeStarted<'_> {
    fn log(&self) {
        tracing::debug!(flow = self.flow, node = self.node, target = self.target, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "node",
            span_name = name,
            flow = self.flow,
            node = self.node,
            target = self.target,
        )
    }
}

/// A node's call returned and its values were stored.
///
/// # Log Level
/// `debug!` - Per-node detail
pub struct NodeCompleted<'a> {
    pub flow: &'a str,
    pub node: &'a str,
    pub duration: Duration,
}

impl Display for NodeCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' completed in {:?}", self.node, self.duration)
    }
}

impl StructuredLog for NodeCompleted<'_> {
    fn log(&self) {
        tracing::debug!(
            flow = self.flow,
            node = self.node,
            duration_us = self.duration.as_micros() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("node_completed", span_name = name, node = self.node)
    }
}

/// Why a node did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Its condition evaluated false.
    Condition,
    /// Every node it depends on was skipped.
    Cascade,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            SkipReason::Condition => write!(f, "condition is false"),
            SkipReason::Cascade => write!(f, "all dependencies were skipped"),
        }
    }
}

/// A node was skipped.
///
/// # Log Level
/// `debug!` - Expected control flow
///
/// # Example
/// ```
/// use the_switchyard::observability::messages::node::{NodeSkipped, SkipReason};
///
/// let msg = NodeSkipped {
///     flow: "checkout",
///     node: "coupon",
///     reason: SkipReason::Condition,
/// };
///
/// assert_eq!(msg.to_string(), "Node 'coupon' skipped: condition is false");
/// ```
pub struct NodeSkipped<'a> {
    pub flow: &'a str,
    pub node: &'a str,
    pub reason: SkipReason,
}

impl Display for NodeSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' skipped: {}", self.node, self.reason)
    }
}

impl StructuredLog for NodeSkipped<'_> {
    fn log(&self) {
        tracing::debug!(
            flow = self.flow,
            node = self.node,
            reason = %self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("node_skipped", span_name = name, node = self.node)
    }
}

/// A node failed.
///
/// # Log Level
/// `warn!` - The flow will fail; the flow-level error is logged separately
pub struct NodeFailed<'a> {
    pub flow: &'a str,
    pub node: &'a str,
    pub error: &'a ExecutionError,
}

impl Display for NodeFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' failed: {}", self.node, self.error)
    }
}

impl StructuredLog for NodeFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            flow = self.flow,
            node = self.node,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "node_failed",
            span_name = name,
            node = self.node,
            error = %self.error,
        )
    }
}

/// A proxy stream was torn down before completion.
///
/// # Log Level
/// `warn!` - Partial response delivered to the caller
pub struct ProxyStreamAborted<'a> {
    pub node: &'a str,
    pub reason: &'a str,
}

impl Display for ProxyStreamAborted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Proxy stream of node '{}' aborted: {}", self.node, self.reason)
    }
}

impl StructuredLog for ProxyStreamAborted<'_> {
    fn log(&self) {
        tracing::warn!(node = self.node, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("proxy_stream_aborted", span_name = name, node = self.node)
    }
}
