// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::conditions::Expression;
use crate::config::Capability;
use crate::functions::FunctionCall;
use crate::references::{PropertyTree, Template, HEADER_SUFFIX};
use crate::traits::Resource;

/// Stable index of a node in [`CompiledFlow::nodes`].
pub type NodeId = usize;

pub enum NodeKind {
    Resource {
        resource: Arc<dyn Resource>,
        request: PropertyTree,
        header: BTreeMap<String, Template>,
        proxy: bool,
        timeout: Option<Duration>,
    },
    Function(FunctionCall),
}

pub struct CompiledRollback {
    pub resource: Arc<dyn Resource>,
    /// `None` replays the compensated node's original request body.
    pub request: Option<PropertyTree>,
    pub header: BTreeMap<String, Template>,
}

pub struct CompiledNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub condition: Option<Expression>,
    pub rollback: Option<CompiledRollback>,
    pub dependencies: Vec<NodeId>,
    pub dependents: Vec<NodeId>,
}

impl CompiledNode {
    pub fn capability(&self) -> Capability {
        match &self.kind {
            NodeKind::Resource { resource, .. } => Capability::Resource(resource.clone()),
            NodeKind::Function(call) => Capability::Function(call.function.clone()),
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.kind, NodeKind::Resource { proxy: true, .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, NodeKind::Function(_))
    }

    pub fn timeout(&self) -> Option<Duration> {
        match &self.kind {
            NodeKind::Resource { timeout, .. } => *timeout,
            NodeKind::Function(_) => None,
        }
    }

    /// Store resource holding the response header; function nodes have none.
    pub fn header_resource(&self) -> Option<String> {
        match self.kind {
            NodeKind::Resource { .. } => Some(format!("{}{}", self.name, HEADER_SUFFIX)),
            NodeKind::Function(_) => None,
        }
    }

    /// Name of the resource or function this node invokes.
    pub fn target(&self) -> &str {
        match &self.kind {
            NodeKind::Resource { resource, .. } => resource.name(),
            NodeKind::Function(call) => call.function.name(),
        }
    }
}

impl fmt::Debug for CompiledNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("target", &self.target())
            .field("proxy", &self.is_proxy())
            .field("condition", &self.condition.is_some())
            .field("rollback", &self.rollback.as_ref().map(|r| r.resource.name().to_string()))
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Statically identified group of nodes sharing one dependency set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub dependencies: Vec<String>,
    pub nodes: Vec<String>,
}

#[derive(Debug, Default)]
pub struct CompiledOutput {
    pub body: PropertyTree,
    pub header: BTreeMap<String, Template>,
}

/// Immutable, arena-style executable form of a flow.
///
/// Nodes and edges are addressed by [`NodeId`]. Executions hold their own
/// mutable state and only ever read from this structure, so one compiled
/// flow is shared across any number of concurrent executions.
pub struct CompiledFlow {
    pub(crate) name: String,
    pub(crate) nodes: Vec<CompiledNode>,
    pub(crate) order: Vec<NodeId>,
    pub(crate) position: Vec<usize>,
    pub(crate) branches: Vec<Branch>,
    pub(crate) resources: Arc<HashMap<String, usize>>,
    pub(crate) output: CompiledOutput,
    pub(crate) proxy: Option<NodeId>,
}

impl CompiledFlow {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[CompiledNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&CompiledNode> {
        self.nodes.get(id)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&CompiledNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// Node names in the deterministic topological order used for scheduling
    /// and failure tie-breaks.
    pub fn topological_order(&self) -> Vec<&str> {
        self.order.iter().map(|&id| self.nodes[id].name.as_str()).collect()
    }

    /// Topological position of a node.
    pub fn position(&self, id: NodeId) -> usize {
        self.position.get(id).copied().unwrap_or(usize::MAX)
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Store resource index shared by every execution of this flow.
    pub fn resources(&self) -> Arc<HashMap<String, usize>> {
        self.resources.clone()
    }

    pub fn output(&self) -> &CompiledOutput {
        &self.output
    }

    pub fn proxy(&self) -> Option<&CompiledNode> {
        self.proxy.and_then(|id| self.nodes.get(id))
    }
}

impl fmt::Debug for CompiledFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFlow")
            .field("name", &self.name)
            .field("nodes", &self.nodes)
            .field("order", &self.topological_order())
            .field("branches", &self.branches)
            .finish()
    }
}
