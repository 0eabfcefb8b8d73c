// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::NodeState;

/// Hooks invoked around node and rollback calls. All methods default to no-ops.
pub trait NodeObserver: Send + Sync {
    fn before_node(&self, _flow: &str, _node: &str) {}

    fn after_node(&self, _flow: &str, _node: &str, _state: NodeState) {}

    fn before_rollback(&self, _flow: &str, _node: &str) {}

    fn after_rollback(&self, _flow: &str, _node: &str, _succeeded: bool) {}
}

pub struct NoopObserver;

impl NodeObserver for NoopObserver {}
