// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-manager
//!
//! Budget-enforced device memory for execution buffers.
//!
//! A device gives every compiled network one [`MemoryPool`] sized by its
//! [`MemoryBudget`]. Each execution request checks out one [`BufferGuard`]
//! per intermediate activation when it is created; when the request is
//! released the guards drop and the memory returns to the pool. An
//! exhausted pool is how "device-side capacity reached" surfaces.
//!
//! ```text
//! MemoryPool::allocate(size)
//!       │
//!       ▼
//!   BufferGuard  ◄─── owns Vec<u64>, holds Arc<PoolInner>
//!       │
//!       │  drop()
//!       ▼
//!   PoolInner::reclaim()  ──► free list
//! ```

mod budget;
mod error;
mod guard;
mod pool;
mod stats;

pub use budget::MemoryBudget;
pub use error::MemoryError;
pub use guard::BufferGuard;
pub use pool::MemoryPool;
pub use stats::AllocationStats;
