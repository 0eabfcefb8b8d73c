// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::engine::NodeState;
use crate::references::StoreError;

/// Failure of a single resource or function invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// The callee reported an error.
    #[error("{message}")]
    Failed { message: String },

    /// The call did not finish within its node timeout or the flow deadline.
    #[error("call timed out after {after:?}")]
    Timeout { after: Duration },

    /// The call was abandoned because the execution was cancelled.
    #[error("call cancelled")]
    Cancelled,

    /// The callee does not implement the requested capability.
    #[error("resource '{resource}' does not support {capability}")]
    Unsupported { resource: String, capability: String },

    /// A forwarded byte stream broke on either side.
    #[error("stream aborted: {message}")]
    Stream { message: String },
}

impl CallError {
    pub fn failed(message: impl Into<String>) -> Self {
        CallError::Failed {
            message: message.into(),
        }
    }
}

/// Runtime failure of one node inside a flow execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// A resource or function call failed. Timeouts are a `CallError` variant.
    #[error("node '{node}' failed: {source}")]
    Call {
        node: String,
        #[source]
        source: CallError,
    },

    /// A required reference had no value when the node became ready.
    #[error("node '{node}' requires '{reference}' which has no value")]
    MissingReference { node: String, reference: String },

    /// A condition could not be evaluated against the stored values.
    #[error("condition of node '{node}' could not be evaluated: {message}")]
    Condition { node: String, message: String },

    /// A resource was written twice inside one execution.
    #[error("resource '{resource}' was already written in this execution")]
    DuplicateWrite { resource: String },

    #[error("resource '{resource}' has no slot in this flow")]
    UnknownResource { resource: String },

    /// The caller cancelled the execution.
    #[error("execution cancelled by caller")]
    Cancelled,

    /// The flow-level deadline elapsed.
    #[error("flow deadline of {after:?} exceeded")]
    DeadlineExceeded { after: Duration },
}

impl ExecutionError {
    /// The node this error originated from, if any.
    pub fn node(&self) -> Option<&str> {
        match self {
            ExecutionError::Call { node, .. }
            | ExecutionError::MissingReference { node, .. }
            | ExecutionError::Condition { node, .. } => Some(node),
            ExecutionError::DuplicateWrite { .. }
            | ExecutionError::UnknownResource { .. }
            | ExecutionError::Cancelled
            | ExecutionError::DeadlineExceeded { .. } => None,
        }
    }

    /// Whether this error is the consequence of an interruption rather than a
    /// failure of the node itself.
    pub fn is_interruption(&self) -> bool {
        matches!(
            self,
            ExecutionError::Cancelled
                | ExecutionError::DeadlineExceeded { .. }
                | ExecutionError::Call {
                    source: CallError::Cancelled,
                    ..
                }
        )
    }
}

impl From<StoreError> for ExecutionError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::DuplicateWrite { resource } => ExecutionError::DuplicateWrite { resource },
            StoreError::UnknownResource { resource } => ExecutionError::UnknownResource { resource },
        }
    }
}

/// A compensating call that failed. Recorded, never fatal to the sweep.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("rollback of node '{node}' via '{resource}' failed: {source}")]
pub struct RollbackError {
    pub node: String,
    pub resource: String,
    #[source]
    pub source: CallError,
}

/// Outcome of a rollback sweep, in the order compensations were attempted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollbackSummary {
    /// Nodes whose compensating call succeeded.
    pub compensated: Vec<String>,
    /// Compensations that failed.
    pub failures: Vec<RollbackError>,
}

impl RollbackSummary {
    pub fn attempted(&self) -> usize {
        self.compensated.len() + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for RollbackSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} compensated, {} failed",
            self.compensated.len(),
            self.failures.len()
        )
    }
}

/// What a caller receives when a flow execution fails. Partial output is never
/// returned; `primary` is the deciding error and `rollback` reports the
/// compensation sweep that ran before this value was produced.
#[derive(Debug, Error)]
#[error("{primary} (rollback: {rollback})")]
pub struct FlowFailure {
    pub flow: String,
    #[source]
    pub primary: ExecutionError,
    pub rollback: RollbackSummary,
    /// Failures observed after the primary one, including nodes cut off by the drain.
    pub secondary: Vec<ExecutionError>,
    /// State of every node, keyed by node name. Nodes cut off before they ran
    /// are `Pending`.
    pub states: BTreeMap<String, NodeState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interruption_classification() {
        assert!(ExecutionError::Cancelled.is_interruption());
        assert!(ExecutionError::Call {
            node: "a".into(),
            source: CallError::Cancelled
        }
        .is_interruption());
        assert!(!ExecutionError::Call {
            node: "a".into(),
            source: CallError::Timeout {
                after: Duration::from_millis(5)
            }
        }
        .is_interruption());
    }

    #[test]
    fn summary_counts_attempts() {
        let summary = RollbackSummary {
            compensated: vec!["b".into()],
            failures: vec![RollbackError {
                node: "a".into(),
                resource: "undo".into(),
                source: CallError::failed("boom"),
            }],
        };
        assert_eq!(summary.attempted(), 2);
        assert!(!summary.is_clean());
        assert_eq!(summary.to_string(), "1 compensated, 1 failed");
    }
}
