// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for flow compilation.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use tracing::Span;

use crate::errors::CompileError;
use crate::observability::messages::StructuredLog;

/// A flow compiled into an executable graph.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_switchyard::observability::messages::compile::FlowCompiled;
/// use std::time::Duration;
///
/// let msg = FlowCompiled {
///     flow: "checkout",
///     node_count: 4,
///     branch_count: 2,
///     duration: Duration::from_micros(180),
/// };
///
/// assert_eq!(msg.to_string(), "Compiled flow 'checkout': 4 nodes in 2 branches (180µs)");
/// ```
pub struct FlowCompiled<'a> {
    pub flow: &'a str,
    pub node_count: usize,
    pub branch_count: usize,
    pub duration: Duration,
}

impl Display for FlowCompiled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Compiled flow '{}': {} nodes in {} branches ({:?})",
            self.flow, self.node_count, self.branch_count, self.duration
        )
    }
}

impl StructuredLog for FlowCompiled<'_> {
    fn log(&self) {
        tracing::info!(
            flow = self.flow,
            node_count = self.node_count,
            branch_count = self.branch_count,
            duration_us = self.duration.as_micros() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "flow_compiled",
            span_name = name,
            flow = self.flow,
            node_count = self.node_count,
        )
    }
}

/// A flow rejected at compile time. Each diagnostic is logged at `debug!`.
///
/// # Log Level
/// `warn!` - The flow will not be served
pub struct FlowRejected<'a> {
    pub flow: &'a str,
    pub errors: &'a [CompileError],
}

impl Display for FlowRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Flow '{}' rejected with {} error(s)", self.flow, self.errors.len())?;
        if let Some(first) = self.errors.first() {
            write!(f, ": {}", first)?;
        }
        Ok(())
    }
}

impl StructuredLog for FlowRejected<'_> {
    fn log(&self) {
        tracing::warn!(flow = self.flow, error_count = self.errors.len(), "{}", self);
        for error in self.errors {
            tracing::debug!(flow = self.flow, error = %error, "compile diagnostic");
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "flow_rejected",
            span_name = name,
            flow = self.flow,
            error_count = self.errors.len(),
        )
    }
}
