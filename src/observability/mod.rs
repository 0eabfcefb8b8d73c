// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Message types follow a struct-based pattern with `Display` and
//! [`messages::StructuredLog`] implementations so that log text and fields
//! live in one place instead of being scattered through the engine.
//!
//! # Usage
//!
//! ```rust
//! use the_switchyard::observability::{init_tracing, messages::StructuredLog};
//! use the_switchyard::observability::messages::rollback::RollbackStarted;
//!
//! init_tracing("the_switchyard=debug");
//!
//! RollbackStarted {
//!     flow: "checkout",
//!     entries: 2,
//! }
//! .log();
//! ```

use tracing_subscriber::EnvFilter;

pub mod messages;

/// Installs a formatting subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`. Safe to call more than once; later calls are ignored.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
