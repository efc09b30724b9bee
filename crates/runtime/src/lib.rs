// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # infer-runtime
//!
//! Client-facing inference runtime: read a model, compile it for a device,
//! bind tensors and run.
//!
//! ```text
//! Engine ──read_model──▶ Model ──compile_model──▶ CompiledModel ──▶ InferRequest
//! ```
//!
//! # Ownership
//! Every runtime object owns exactly one [`ResourceHandle`] and releases it
//! once, deterministically: explicitly through `release(self)` or at the
//! end of its scope. Back-references are borrows, so the release order
//! `InferRequest` → `CompiledModel` → `Model` is checked by the compiler.
//!
//! # Devices
//! Devices come from plugins in a process-wide catalog, bootstrapped by
//! [`init`]. The built-in `reference_cpu` plugin runs f32 graphs with the
//! `tensor-core` kernels; additional plugins implement [`Device`] and are
//! added with [`register_plugin_factory`].
//!
//! # Async Execution
//! [`InferRequest::start_async`] hands the run to the compiled model's
//! tokio blocking pool and returns; [`InferRequest::wait`] and
//! [`InferRequest::wait_for`] collect the result.

mod compiled;
mod config;
pub mod device;
mod engine;
mod error;
mod handle;
mod model;
mod plugin;
mod profiling;
mod property;
mod request;

pub use compiled::CompiledModel;
pub use config::{EngineConfig, PluginEntry, DEFAULT_DEVICE, DEFAULT_PLUGIN};
pub use engine::{Engine, HandleReport};
pub use error::RuntimeError;
pub use handle::{HandleId, HandleKind, HandleStats, HandleTable, ResourceHandle};
pub use model::Model;
pub use plugin::{
    init, register_plugin_factory, CompiledNetwork, CompletionCallback, CompletionSender, Device,
    DeviceFactory, ExecutionOutput, PendingExecution, PluginCatalog, RequestContext, TensorMap,
    REFERENCE_CPU,
};
pub use profiling::{LayerProfile, ProfilingReport};
pub use property::{keys, properties, Mutability, PropertyInfo, PropertyMap, PropertyValue};
pub use request::{InferRequest, RequestState};

pub use memory_manager::{MemoryBudget, MemoryError};
pub use model_ir::graph::Validated;
pub use model_ir::{ModelError, ModelGraph, PortDef, WeightStore};
pub use tensor_core::{DType, Element, Shape, Tensor, TensorError, TensorView};
