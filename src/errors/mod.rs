// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error taxonomy for flow compilation and execution.
//!
//! Compile-time errors ([`CompileError`], [`ConditionError`]) reject a flow before
//! anything runs. Runtime errors ([`ExecutionError`], [`CallError`]) fail a single
//! execution and always attempt a rollback before they surface inside a
//! [`FlowFailure`]. Compensation problems are collected as [`RollbackError`]s and
//! never abort the rollback sweep.

mod compile;
mod config;
mod execution;

pub use compile::{CompileError, ConditionError};
pub use config::ConfigError;
pub use execution::{CallError, ExecutionError, FlowFailure, RollbackError, RollbackSummary};
