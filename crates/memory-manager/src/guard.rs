// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII handle for pool-allocated buffers.

use std::sync::Arc;

use crate::pool::PoolInner;

/// Exclusive ownership of one pool buffer; returns it to the pool on drop.
///
/// The buffer is backed by `u64` words, so its start is 8-byte aligned and
/// can be reinterpreted as any primitive element type. Only the first
/// [`size_bytes`](Self::size_bytes) bytes are exposed.
pub struct BufferGuard {
    words: Vec<u64>,
    size_bytes: usize,
    pool: Arc<PoolInner>,
}

impl BufferGuard {
    pub(crate) fn new(words: Vec<u64>, size_bytes: usize, pool: Arc<PoolInner>) -> Self {
        Self {
            words,
            size_bytes,
            pool,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.size_bytes]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..self.size_bytes]
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

impl Drop for BufferGuard {
    fn drop(&mut self) {
        let words = std::mem::take(&mut self.words);
        self.pool.reclaim(words, self.size_bytes);
    }
}

impl std::fmt::Debug for BufferGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferGuard")
            .field("size_bytes", &self.size_bytes)
            .field("capacity_bytes", &(self.words.len() * 8))
            .finish()
    }
}
