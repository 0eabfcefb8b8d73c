// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Resource implementations that ship with the engine.
//!
//! Real deployments register their own [`Resource`](crate::traits::Resource)
//! implementations, each owning its transport. This module only carries
//! in-process resources.
//!
//! # Available Backends
//!
//! ## In-process
//! - **FnResource**: an async closure, for glue logic and prototyping
//! - **StaticResource**: a fixed response, for configuration lookups and defaults
//!
//! ## Stub Backend (Test-Only)
//! Test doubles for engine development (only available in test builds):
//! - **RecordingResource**: records requests, echoes or responds, fails, sleeps
//! - **ForwardingResource**: echoes a streamed body for proxy tests
//! - **CountingReader**: byte source that counts what it has produced
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use the_switchyard::backends::StaticResource;
//! use the_switchyard::config::Registry;
//!
//! let mut registry = Registry::with_builtins();
//! registry.register_resource(Arc::new(StaticResource::new(
//!     "defaults",
//!     serde_json::json!({ "currency": "EUR" }),
//! )));
//!
//! assert!(registry.resource("defaults").is_some());
//! ```

mod in_process;
#[cfg(test)]
pub mod stub;

pub use in_process::{FnResource, StaticResource};
