// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Template functions: the built-in set and the compile-time resolver that
//! turns every call site into its own graph node.

pub mod builtin;
mod resolver;

pub use resolver::{FunctionCall, FunctionResolver};
