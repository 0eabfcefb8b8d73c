// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Compilation of flow definitions into executable dependency graphs.

mod builder;
mod compiled;
mod dependency_graph;

pub use builder::compile;
pub use compiled::{
    Branch, CompiledFlow, CompiledNode, CompiledOutput, CompiledRollback, NodeId, NodeKind,
};
pub use dependency_graph::DependencyGraph;
