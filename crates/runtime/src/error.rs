// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the inference runtime.

use memory_manager::MemoryError;
use model_ir::ModelError;
use tensor_core::{DType, TensorError};

use crate::handle::{HandleId, HandleKind};

/// Every failure the runtime surfaces to callers.
///
/// Protocol misuse (`RequestBusy`, `NotRunning`) and lifetime violations
/// (`UseAfterRelease`, `DoubleRelease`, `DanglingReference`) are raised
/// immediately at the offending call.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The model file or description could not be read.
    #[error("model load failed: {0}")]
    ModelLoad(#[from] ModelError),

    #[error("device '{device}' is not registered")]
    DeviceNotFound { device: String },

    /// A property key or value is not recognised by the device.
    #[error("device '{device}' does not support {key}: {detail}")]
    UnsupportedConfig {
        device: String,
        key: String,
        detail: String,
    },

    /// The graph cannot be compiled for the device.
    #[error("compilation for '{device}' failed: {detail}")]
    Compilation { device: String, detail: String },

    /// The device cannot provide the buffers for another request.
    #[error("device '{device}' resources exhausted: {source}")]
    ResourceExhausted {
        device: String,
        #[source]
        source: MemoryError,
    },

    /// The request already has a run in flight.
    #[error("infer request is busy: a run is in flight")]
    RequestBusy,

    /// `wait` was called on a request that was never started.
    #[error("infer request is not running")]
    NotRunning,

    /// The device reported a failure while executing.
    #[error("inference on '{device}' failed: {detail}")]
    Inference { device: String, detail: String },

    /// A tensor's element type does not match the port it is bound to.
    #[error("port '{port}' expects {expected}, got {actual}")]
    TypeMismatch {
        port: String,
        expected: DType,
        actual: DType,
    },

    /// A tensor cannot be bound to a port (shape, writability).
    #[error("invalid tensor for port '{port}': {detail}")]
    InvalidTensor { port: String, detail: String },

    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),

    #[error("no port named '{name}'")]
    PortNotFound { name: String },

    /// The single-output accessor was used on a model with several outputs.
    #[error("model has {count} outputs; name one explicitly")]
    AmbiguousOutput { count: usize },

    #[error("{kind} handle {id} used after release")]
    UseAfterRelease { kind: HandleKind, id: HandleId },

    #[error("{kind} handle {id} released twice")]
    DoubleRelease { kind: HandleKind, id: HandleId },

    /// A back-reference points at a handle the table no longer knows.
    #[error("{kind} handle {id} is dangling")]
    DanglingReference { kind: HandleKind, id: HandleId },

    #[error("plugin '{plugin}': {detail}")]
    Plugin { plugin: String, detail: String },

    /// The device still backs live compiled models.
    #[error("device '{device}' has {live} live compiled models")]
    DeviceBusy { device: String, live: usize },

    #[error("configuration error: {0}")]
    Config(String),
}

impl RuntimeError {
    pub(crate) fn unsupported(device: &str, key: &str, detail: impl Into<String>) -> Self {
        Self::UnsupportedConfig {
            device: device.to_string(),
            key: key.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn inference(device: &str, detail: impl Into<String>) -> Self {
        Self::Inference {
            device: device.to_string(),
            detail: detail.into(),
        }
    }
}
