// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Immutable models read by the engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use model_ir::graph::Validated;
use model_ir::{LoadedModel, ModelGraph, PortDef, WeightStore};

use crate::handle::{HandleId, HandleKind, HandleTable, ResourceHandle};
use crate::RuntimeError;

struct ModelData {
    graph: ModelGraph<Validated>,
    weights: Option<WeightStore>,
    source: Option<PathBuf>,
}

/// A computation graph with its weights.
///
/// A model never changes after it is read; it can be compiled any number of
/// times, for different devices and configurations, from several threads.
///
/// Compiled models borrow the model they were built from, so it cannot be
/// released while one of them is alive:
///
/// ```compile_fail
/// # fn f(engine: &infer_runtime::Engine, model: infer_runtime::Model) {
/// let compiled = engine.compile_model(&model, "CPU").unwrap();
/// model.release().unwrap(); // error: `model` is still borrowed
/// drop(compiled);
/// # }
/// ```
pub struct Model {
    handle: ResourceHandle<ModelData>,
}

impl Model {
    pub(crate) fn new(table: &Arc<HandleTable>, loaded: LoadedModel) -> Self {
        let LoadedModel {
            graph,
            weights,
            source,
        } = loaded;
        tracing::info!(
            model = %graph.name,
            layers = graph.num_layers(),
            weights = weights.as_ref().map_or(0, WeightStore::len),
            "Model read"
        );
        let data = ModelData {
            graph,
            weights,
            source,
        };
        Self {
            handle: ResourceHandle::new(table, HandleKind::Model, data),
        }
    }

    fn data(&self) -> &ModelData {
        self.handle
            .get()
            .expect("model data must exist until the model is released")
    }

    pub fn name(&self) -> &str {
        &self.data().graph.name
    }

    /// Inputs in declaration order.
    pub fn inputs(&self) -> &[PortDef] {
        &self.data().graph.inputs
    }

    /// Outputs in declaration order.
    pub fn outputs(&self) -> &[PortDef] {
        &self.data().graph.outputs
    }

    pub fn input(&self, name: &str) -> Result<&PortDef, RuntimeError> {
        self.data()
            .graph
            .input(name)
            .ok_or_else(|| RuntimeError::PortNotFound {
                name: name.to_string(),
            })
    }

    pub fn output(&self, name: &str) -> Result<&PortDef, RuntimeError> {
        self.data()
            .graph
            .output(name)
            .ok_or_else(|| RuntimeError::PortNotFound {
                name: name.to_string(),
            })
    }

    /// Explicit batch size, else the `N` axis of the first input.
    pub fn batch_size(&self) -> usize {
        self.data().graph.batch_size()
    }

    /// `false` for topology-only models.
    pub fn has_weights(&self) -> bool {
        self.data().weights.is_some()
    }

    /// Description file the model came from; `None` when read from memory.
    pub fn source(&self) -> Option<&Path> {
        self.data().source.as_deref()
    }

    pub fn summary(&self) -> String {
        self.data().graph.summary()
    }

    pub fn handle_id(&self) -> HandleId {
        self.handle.id()
    }

    /// Checks the model against the engine that read it.
    pub(crate) fn ensure_live(&self) -> Result<(), RuntimeError> {
        self.handle.ensure_live()
    }

    pub(crate) fn graph(&self) -> &ModelGraph<Validated> {
        &self.data().graph
    }

    pub(crate) fn weights(&self) -> Option<&WeightStore> {
        self.data().weights.as_ref()
    }

    /// Releases the model now instead of at the end of its scope.
    pub fn release(mut self) -> Result<(), RuntimeError> {
        self.handle.release()
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name())
            .field("handle", &self.handle)
            .finish()
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.data().graph)
    }
}
