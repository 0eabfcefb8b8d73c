// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default per-node call timeout (30 seconds)
pub const DEFAULT_NODE_TIMEOUT_MS: u64 = 30_000;
/// Default bound on draining running nodes once scheduling stops (1 second)
pub const DEFAULT_DRAIN_GRACE_MS: u64 = 1_000;
/// Default proxy stream window (64 KiB)
pub const DEFAULT_PROXY_WINDOW_BYTES: usize = 64 * 1024;
/// Concurrency used when the host parallelism cannot be determined
pub const FALLBACK_MAX_CONCURRENCY: usize = 4;
