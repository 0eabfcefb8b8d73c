// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the compensation sweep.

use std::fmt::{Display, Formatter};

use tracing::Span;

use crate::errors::{RollbackError, RollbackSummary};
use crate::observability::messages::StructuredLog;

/// Rollback sweep started.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RollbackStarted<'a> {
    pub flow: &'a str,
    pub entries: usize,
}

impl Display for RollbackStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rolling back flow '{}': {} compensable node(s)",
            self.flow, self.entries
        )
    }
}

impl StructuredLog for RollbackStarted<'_> {
    fn log(&self) {
        tracing::info!(flow = self.flow, entries = self.entries, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "rollback",
            span_name = name,
            flow = self.flow,
            entries = self.entries,
        )
    }
}

/// One compensating call succeeded.
///
/// # Log Level
/// `debug!` - Per-node detail
pub struct Compensated<'a> {
    pub node: &'a str,
    pub resource: &'a str,
}

impl Display for Compensated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Compensated node '{}' via '{}'", self.node, self.resource)
    }
}

impl StructuredLog for Compensated<'_> {
    fn log(&self) {
        tracing::debug!(node = self.node, resource = self.resource, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("compensated", span_name = name, node = self.node)
    }
}

/// One compensating call failed. The sweep continues.
///
/// # Log Level
/// `error!` - Possibly inconsistent downstream state
pub struct CompensationFailed<'a> {
    pub error: &'a RollbackError,
}

impl Display for CompensationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Compensation failed: {}", self.error)
    }
}

impl StructuredLog for CompensationFailed<'_> {
    fn log(&self) {
        tracing::error!(
            node = %self.error.node,
            resource = %self.error.resource,
            error = %self.error.source,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "compensation_failed",
            span_name = name,
            node = %self.error.node,
        )
    }
}

/// Rollback sweep finished.
///
/// # Log Level
/// `info!` when clean, `warn!` when any compensation failed
pub struct RollbackFinished<'a> {
    pub flow: &'a str,
    pub summary: &'a RollbackSummary,
}

impl Display for RollbackFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Rollback of flow '{}' finished: {}", self.flow, self.summary)
    }
}

impl StructuredLog for RollbackFinished<'_> {
    fn log(&self) {
        if self.summary.is_clean() {
            tracing::info!(flow = self.flow, attempted = self.summary.attempted(), "{}", self);
        } else {
            tracing::warn!(
                flow = self.flow,
                attempted = self.summary.attempted(),
                failed = self.summary.failures.len(),
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("rollback_finished", span_name = name, flow = self.flow)
    }
}
