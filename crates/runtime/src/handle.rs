// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Resource handles with single-release semantics.
//!
//! Every runtime entity (model, compiled model, infer request) owns exactly
//! one [`ResourceHandle`]. The handle registers itself in the engine's
//! [`HandleTable`] on creation and unregisters exactly once, either through
//! an explicit [`release`](ResourceHandle::release) or when dropped.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::RuntimeError;

/// What a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum HandleKind {
    Model,
    CompiledModel,
    InferRequest,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandleKind::Model => "model",
            HandleKind::CompiledModel => "compiled model",
            HandleKind::InferRequest => "infer request",
        })
    }
}

/// Opaque identifier, unique within one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifetime counters for one [`HandleKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct HandleStats {
    pub created: u64,
    pub released: u64,
}

impl HandleStats {
    pub fn live(&self) -> u64 {
        self.created - self.released
    }
}

/// Registry of live handles owned by one engine.
#[derive(Debug, Default)]
pub struct HandleTable {
    next: AtomicU64,
    live: Mutex<HashMap<HandleId, HandleKind>>,
    stats: Mutex<BTreeMap<HandleKind, HandleStats>>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, kind: HandleKind) -> HandleId {
        let id = HandleId(self.next.fetch_add(1, Ordering::Relaxed) + 1);
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, kind);
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .created += 1;
        id
    }

    fn unregister(&self, id: HandleId, kind: HandleKind) -> Result<(), RuntimeError> {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match removed {
            Some(k) if k == kind => {
                self.stats
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(kind)
                    .or_default()
                    .released += 1;
                Ok(())
            }
            _ => Err(RuntimeError::DanglingReference { kind, id }),
        }
    }

    /// Checks that a back-reference still points at a live handle.
    pub fn ensure_live(&self, id: HandleId, kind: HandleKind) -> Result<(), RuntimeError> {
        let live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        match live.get(&id) {
            Some(&k) if k == kind => Ok(()),
            _ => Err(RuntimeError::DanglingReference { kind, id }),
        }
    }

    pub fn stats(&self, kind: HandleKind) -> HandleStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .copied()
            .unwrap_or_default()
    }

    /// Handles currently registered, of any kind.
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Exclusive owner of one runtime object.
///
/// `release` may be called once; a second call fails with
/// [`RuntimeError::DoubleRelease`] and any access afterwards with
/// [`RuntimeError::UseAfterRelease`]. The object itself is dropped exactly
/// once, whichever path releases it.
pub struct ResourceHandle<T> {
    id: HandleId,
    kind: HandleKind,
    object: Option<T>,
    table: Arc<HandleTable>,
}

impl<T> ResourceHandle<T> {
    pub fn new(table: &Arc<HandleTable>, kind: HandleKind, object: T) -> Self {
        let id = table.register(kind);
        Self {
            id,
            kind,
            object: Some(object),
            table: Arc::clone(table),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn is_valid(&self) -> bool {
        self.object.is_some()
    }

    /// Checks this handle against the table it was registered in.
    pub fn ensure_live(&self) -> Result<(), RuntimeError> {
        self.table.ensure_live(self.id, self.kind)
    }

    pub fn get(&self) -> Result<&T, RuntimeError> {
        self.object.as_ref().ok_or(RuntimeError::UseAfterRelease {
            kind: self.kind,
            id: self.id,
        })
    }

    pub fn get_mut(&mut self) -> Result<&mut T, RuntimeError> {
        self.object.as_mut().ok_or(RuntimeError::UseAfterRelease {
            kind: self.kind,
            id: self.id,
        })
    }

    /// Drops the object and unregisters the handle.
    pub fn release(&mut self) -> Result<(), RuntimeError> {
        let object = self.object.take().ok_or(RuntimeError::DoubleRelease {
            kind: self.kind,
            id: self.id,
        })?;
        drop(object);
        self.table.unregister(self.id, self.kind)?;
        tracing::trace!(kind = %self.kind, id = %self.id, "handle released");
        Ok(())
    }
}

impl<T> Drop for ResourceHandle<T> {
    fn drop(&mut self) {
        if self.object.is_some() {
            if let Err(e) = self.release() {
                tracing::error!("{e}");
            }
        }
    }
}

impl<T> fmt::Debug for ResourceHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("valid", &self.is_valid())
            .finish()
    }
}
