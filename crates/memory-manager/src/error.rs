// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for device memory management.

/// Errors raised by [`crate::MemoryPool`] and [`crate::MemoryBudget`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// The allocation would exceed the pool's budget.
    #[error("out of device memory: requested {requested_bytes} bytes, {available_bytes} available (budget {budget_bytes})")]
    OutOfMemory {
        requested_bytes: usize,
        available_bytes: usize,
        budget_bytes: usize,
    },

    #[error("cannot allocate zero-sized buffer")]
    ZeroSizedAllocation,

    /// A budget string could not be parsed.
    #[error("invalid memory budget '{0}': expected a positive number with optional K/M/G suffix")]
    InvalidBudget(String),

    /// Internal bookkeeping was found inconsistent (poisoned lock).
    #[error("pool integrity error: {0}")]
    PoolCorruption(String),
}
