// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocation statistics.

/// Cumulative counters for one [`crate::MemoryPool`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocationStats {
    /// Successful allocations.
    pub allocations: u64,
    /// Allocations served from the free list.
    pub reuse_hits: u64,
    /// Allocations rejected by the budget.
    pub oom_count: u64,
    /// Buffers returned to the pool.
    pub deallocations: u64,
    /// Buffers currently checked out.
    pub live_buffers: usize,
    /// High-water mark of checked-out bytes.
    pub peak_bytes: usize,
}

impl AllocationStats {
    pub(crate) fn record_allocation(&mut self, reused: bool, in_use_bytes: usize) {
        self.allocations += 1;
        self.live_buffers += 1;
        if reused {
            self.reuse_hits += 1;
        }
        self.peak_bytes = self.peak_bytes.max(in_use_bytes);
    }

    pub(crate) fn record_oom(&mut self) {
        self.oom_count += 1;
    }

    pub(crate) fn record_deallocation(&mut self) {
        self.deallocations += 1;
        self.live_buffers = self.live_buffers.saturating_sub(1);
    }

    /// Fraction of allocations served from the free list.
    pub fn reuse_ratio(&self) -> f64 {
        if self.allocations == 0 {
            return 0.0;
        }
        self.reuse_hits as f64 / self.allocations as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "{} allocations ({:.0}% reused), {} live, {} OOMs, peak {} bytes",
            self.allocations,
            self.reuse_ratio() * 100.0,
            self.live_buffers,
            self.oom_count,
            self.peak_bytes,
        )
    }
}
