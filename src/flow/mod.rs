// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Declarative flow definitions as handed over by a definitions loader.
//!
//! A [`FlowDefinition`] is the parsed, not yet compiled, description of a flow:
//! its nodes, their request templates, conditions and rollbacks, and the output
//! template. Templates are still raw strings here; `graph::compile` parses,
//! resolves and type-checks them.

mod definition;
mod schema;

pub use definition::{
    FlowDefinition, NodeDefinition, ParameterMap, PropertyDefinition, RollbackDefinition,
    TypedProperty,
};
pub use schema::{PropertyType, Schema};

/// Property values flowing through the reference store.
pub type Value = serde_json::Value;

/// Header or metadata key/value pairs of a request or response.
pub type Metadata = std::collections::BTreeMap<String, String>;
