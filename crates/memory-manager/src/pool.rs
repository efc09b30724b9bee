// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Budget-enforced buffer pool.
//!
//! Returned buffers are kept on a free list binned by power-of-two size
//! class, so a request slot that is recreated reuses the same memory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{AllocationStats, BufferGuard, MemoryBudget, MemoryError};

/// Smallest size class, in `u64` words (4 KiB).
const MIN_CLASS_WORDS: usize = 512;

/// Shared state behind a [`MemoryPool`] and every [`BufferGuard`] it issued.
pub(crate) struct PoolInner {
    budget: MemoryBudget,
    in_use: AtomicUsize,
    free: Mutex<HashMap<usize, Vec<Vec<u64>>>>,
    stats: Mutex<AllocationStats>,
}

impl PoolInner {
    /// Takes a buffer back from a dropped guard.
    pub(crate) fn reclaim(&self, words: Vec<u64>, size_bytes: usize) {
        self.in_use.fetch_sub(size_bytes, Ordering::AcqRel);
        if let Ok(mut stats) = self.stats.lock() {
            stats.record_deallocation();
        }
        if words.is_empty() {
            return;
        }
        if let Ok(mut free) = self.free.lock() {
            free.entry(words.len()).or_default().push(words);
        }
    }

    /// Reserves `size` bytes against the budget, or reports how much is left.
    fn reserve(&self, size: usize) -> Result<usize, usize> {
        let budget = self.budget.as_bytes();
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(size).filter(|&total| total <= budget)
            })
            .map(|previous| previous + size)
            .map_err(|current| budget.saturating_sub(current))
    }
}

/// Allocator for device execution buffers.
///
/// Cheap to clone; clones share the same budget and free list.
///
/// ```
/// use memory_manager::{MemoryBudget, MemoryPool};
///
/// let pool = MemoryPool::new(MemoryBudget::from_bytes(8192));
/// let a = pool.allocate(4096).unwrap();
/// assert!(pool.allocate(8192).is_err());
/// drop(a);
/// assert_eq!(pool.in_use_bytes(), 0);
/// ```
#[derive(Clone)]
pub struct MemoryPool {
    inner: Arc<PoolInner>,
}

impl MemoryPool {
    pub fn new(budget: MemoryBudget) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                budget,
                in_use: AtomicUsize::new(0),
                free: Mutex::new(HashMap::new()),
                stats: Mutex::new(AllocationStats::default()),
            }),
        }
    }

    /// Hands out a zeroed buffer of `size_bytes`.
    ///
    /// # Errors
    /// [`MemoryError::OutOfMemory`] if the budget would be exceeded;
    /// [`MemoryError::ZeroSizedAllocation`] for `size_bytes == 0`.
    pub fn allocate(&self, size_bytes: usize) -> Result<BufferGuard, MemoryError> {
        if size_bytes == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }
        let in_use = match self.inner.reserve(size_bytes) {
            Ok(total) => total,
            Err(available_bytes) => {
                self.lock_stats()?.record_oom();
                tracing::debug!(
                    requested = size_bytes,
                    available = available_bytes,
                    "device pool exhausted"
                );
                return Err(MemoryError::OutOfMemory {
                    requested_bytes: size_bytes,
                    available_bytes,
                    budget_bytes: self.inner.budget.as_bytes(),
                });
            }
        };

        let class = size_class(size_bytes);
        let recycled = self
            .inner
            .free
            .lock()
            .map_err(|_| MemoryError::PoolCorruption("free list lock poisoned".into()))?
            .get_mut(&class)
            .and_then(Vec::pop);
        let reused = recycled.is_some();
        let words = match recycled {
            Some(mut words) => {
                words.fill(0);
                words
            }
            None => vec![0u64; class],
        };

        self.lock_stats()?.record_allocation(reused, in_use);
        Ok(BufferGuard::new(words, size_bytes, Arc::clone(&self.inner)))
    }

    /// Bytes currently checked out.
    pub fn in_use_bytes(&self) -> usize {
        self.inner.in_use.load(Ordering::Acquire)
    }

    pub fn available_bytes(&self) -> usize {
        self.inner.budget.as_bytes().saturating_sub(self.in_use_bytes())
    }

    pub fn budget(&self) -> MemoryBudget {
        self.inner.budget
    }

    pub fn stats(&self) -> AllocationStats {
        self.inner
            .stats
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Drops every cached free buffer.
    pub fn shrink(&self) {
        if let Ok(mut free) = self.inner.free.lock() {
            free.clear();
        }
    }

    fn lock_stats(&self) -> Result<std::sync::MutexGuard<'_, AllocationStats>, MemoryError> {
        self.inner
            .stats
            .lock()
            .map_err(|_| MemoryError::PoolCorruption("stats lock poisoned".into()))
    }
}

/// Power-of-two word count large enough for `size_bytes`.
fn size_class(size_bytes: usize) -> usize {
    size_bytes.div_ceil(8).max(MIN_CLASS_WORDS).next_power_of_two()
}

impl std::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("budget", &self.inner.budget)
            .field("in_use_bytes", &self.in_use_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_drop() {
        let pool = MemoryPool::new(MemoryBudget::from_mb(1));
        let guard = pool.allocate(1000).unwrap();
        assert_eq!(pool.in_use_bytes(), 1000);
        assert_eq!(guard.size_bytes(), 1000);
        assert_eq!(guard.as_slice().len(), 1000);

        drop(guard);
        assert_eq!(pool.in_use_bytes(), 0);
        assert_eq!(pool.stats().live_buffers, 0);
    }

    #[test]
    fn test_buffers_are_word_aligned() {
        let pool = MemoryPool::new(MemoryBudget::unlimited());
        let guard = pool.allocate(24).unwrap();
        assert_eq!(guard.as_slice().as_ptr() as usize % 8, 0);
    }

    #[test]
    fn test_reused_buffer_is_zeroed() {
        let pool = MemoryPool::new(MemoryBudget::from_mb(1));
        let mut guard = pool.allocate(64).unwrap();
        guard.as_mut_slice().fill(0xAB);
        drop(guard);

        let again = pool.allocate(64).unwrap();
        assert!(again.as_slice().iter().all(|&b| b == 0));
        let stats = pool.stats();
        assert_eq!(stats.reuse_hits, 1);
        assert_eq!(stats.allocations, 2);
    }

    #[test]
    fn test_budget_enforced() {
        let pool = MemoryPool::new(MemoryBudget::from_bytes(1024));
        let _a = pool.allocate(512).unwrap();
        let _b = pool.allocate(512).unwrap();

        let err = pool.allocate(1).unwrap_err();
        assert_eq!(
            err,
            MemoryError::OutOfMemory {
                requested_bytes: 1,
                available_bytes: 0,
                budget_bytes: 1024
            }
        );
        assert_eq!(pool.stats().oom_count, 1);
    }

    #[test]
    fn test_zero_allocation() {
        let pool = MemoryPool::new(MemoryBudget::from_mb(1));
        assert_eq!(pool.allocate(0).unwrap_err(), MemoryError::ZeroSizedAllocation);
    }

    #[test]
    fn test_clones_share_budget() {
        let pool = MemoryPool::new(MemoryBudget::from_bytes(100));
        let other = pool.clone();
        let _g = pool.allocate(80).unwrap();
        assert_eq!(other.available_bytes(), 20);
        assert!(other.allocate(30).is_err());
    }

    #[test]
    fn test_guard_outlives_pool_handle() {
        let pool = MemoryPool::new(MemoryBudget::from_mb(1));
        let guard = pool.allocate(128).unwrap();
        drop(pool);
        assert_eq!(guard.as_slice().len(), 128);
    }

    #[test]
    fn test_shrink_clears_free_list() {
        let pool = MemoryPool::new(MemoryBudget::from_mb(1));
        drop(pool.allocate(64).unwrap());
        pool.shrink();
        let _g = pool.allocate(64).unwrap();
        assert_eq!(pool.stats().reuse_hits, 0);
    }

    #[test]
    fn test_size_class() {
        assert_eq!(size_class(1), MIN_CLASS_WORDS);
        assert_eq!(size_class(4096), 512);
        assert_eq!(size_class(4097), 1024);
    }
}
