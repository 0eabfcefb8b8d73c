// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit the event with typed fields at its documented
//! level.
//!
//! # Organization
//!
//! * `compile` - flow compilation results
//! * `engine` - execution lifecycle of a flow
//! * `node` - per-node scheduling, calls and skips
//! * `rollback` - compensation sweep
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_switchyard::observability::messages::engine::ExecutionStarted;
//! use the_switchyard::observability::messages::StructuredLog;
//!
//! let msg = ExecutionStarted {
//!     flow: "checkout",
//!     node_count: 5,
//!     max_concurrency: 4,
//! };
//!
//! msg.log();
//! ```

use tracing::Span;

pub mod compile;
pub mod engine;
pub mod node;
pub mod rollback;

/// A message that knows its own level and structured fields.
pub trait StructuredLog {
    /// Emits the event.
    fn log(&self);

    /// Opens a span carrying the same fields.
    fn span(&self, name: &str) -> Span;
}
