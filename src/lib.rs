// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Declarative micro-service flow orchestration.
//!
//! A flow is a set of nodes, each calling a resource (a downstream service)
//! or a function. Nodes reference each other's values with
//! `{{ resource:path }}` templates; those references become the edges of a
//! dependency graph that is checked once at load time and then executed with
//! maximal parallelism, conditional skips and reverse-order rollback.
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use the_switchyard::backends::StaticResource;
//! use the_switchyard::config::{EngineOptions, Registry};
//! use the_switchyard::engine::{FlowEngine, FlowInput};
//! use the_switchyard::flow::{FlowDefinition, NodeDefinition};
//! use the_switchyard::graph::compile;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut registry = Registry::with_builtins();
//! registry.register_resource(Arc::new(StaticResource::new("users", json!({ "name": "Ada" }))));
//!
//! let definition = FlowDefinition::new("greet")
//!     .node(NodeDefinition::new("user", "users").request("id", json!("{{ input:id }}")))
//!     .output("greeting", json!("{{ sprintf('hello %s', user:name) }}"));
//!
//! let flow = Arc::new(compile(&definition, &registry).unwrap());
//! let engine = FlowEngine::new(EngineOptions::default());
//! let output = engine.execute(flow, FlowInput::new(json!({ "id": 7 }))).await.unwrap();
//!
//! assert_eq!(output.body, json!({ "greeting": "hello Ada" }));
//! # }
//! ```

pub mod backends;      // in-process resources and test doubles
pub mod conditions;    // condition expressions
pub mod config;        // loader, engine options, registry
pub mod engine;        // scheduler, rollback, proxy forwarding
pub mod errors;        // error handling
pub mod flow;          // declarative flow definitions
pub mod functions;     // built-in functions and call-site resolution
pub mod graph;         // dependency graph builder
pub mod observability;
pub mod references;    // templates and the per-execution store
pub mod traits;        // resource and function abstractions

pub use config::{load_and_compile, EngineOptions, Registry};
pub use engine::{FlowEngine, FlowInput, FlowManager, FlowOutput, NodeState};
pub use errors::{CompileError, ExecutionError, FlowFailure};
pub use flow::{FlowDefinition, NodeDefinition};
pub use graph::{compile, CompiledFlow};
