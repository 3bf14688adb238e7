// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocation statistics for profiling and diagnostics.
//!
//! Byte counters track block sizes, not requested sizes, so `live_bytes`
//! reflects what the arena actually has committed including rounding.

/// Cumulative statistics about arena usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocationStats {
    /// Successful allocations.
    pub allocations: u64,
    /// Blocks returned to the free lists.
    pub frees: u64,
    /// Calls to `realloc` that passed validation.
    pub reallocations: u64,
    /// Requests that failed (order too large or arena exhausted).
    pub failed: u64,
    /// Block splits performed while allocating.
    pub splits: u64,
    /// Buddy merges performed while freeing.
    pub merges: u64,
    /// Bytes in live blocks.
    pub live_bytes: usize,
    /// High-water mark of `live_bytes`.
    pub peak_live_bytes: usize,
    /// Requests served by the system allocator while the arena was disabled.
    pub system_fallbacks: u64,
}

impl AllocationStats {
    pub(crate) fn record_allocation(&mut self, block_size: usize) {
        self.allocations += 1;
        self.live_bytes += block_size;
        self.peak_live_bytes = self.peak_live_bytes.max(self.live_bytes);
    }

    pub(crate) fn record_free(&mut self, block_size: usize) {
        self.frees += 1;
        self.live_bytes = self.live_bytes.saturating_sub(block_size);
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub(crate) fn record_system_fallback(&mut self) {
        self.system_fallbacks += 1;
    }

    /// Fraction of requests that failed, in `[0.0, 1.0]`.
    pub fn failure_ratio(&self) -> f64 {
        let total = self.allocations + self.failed;
        if total == 0 {
            return 0.0;
        }
        self.failed as f64 / total as f64
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Arena: {} allocations, {} frees, {} reallocs, {} failed, \
             {} splits, {} merges, live {} B, peak {} B, {} system fallbacks",
            self.allocations,
            self.frees,
            self.reallocations,
            self.failed,
            self.splits,
            self.merges,
            self.live_bytes,
            self.peak_live_bytes,
            self.system_fallbacks,
        )
    }
}
