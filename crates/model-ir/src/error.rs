// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for model loading and graph construction.

use std::path::PathBuf;

/// Errors that can occur while reading or validating a model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A model or weights file could not be read.
    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    /// The graph description JSON is malformed.
    #[error("failed to parse graph description: {0}")]
    Parse(#[from] serde_json::Error),

    /// A weights container was given where a graph description was expected.
    #[error("unsupported model format: '{}'", path.display())]
    UnsupportedFormat { path: PathBuf },

    /// The graph description file does not exist.
    #[error("model file not found: '{}'", path.display())]
    ModelNotFound { path: PathBuf },

    /// An explicitly requested weights file does not exist.
    #[error("weights file not found: '{}'", path.display())]
    WeightsNotFound { path: PathBuf },

    /// A weight tensor referenced by a layer is missing from the weights file.
    #[error("weight tensor not found: {name}")]
    WeightNotFound { name: String },

    /// The SafeTensors container could not be decoded.
    #[error("failed to load SafeTensors: {0}")]
    SafeTensorsError(String),

    /// An element type label is not recognised.
    #[error("unsupported element type '{0}'")]
    UnsupportedDType(String),

    /// A layer definition is invalid (unknown type, incompatible shapes).
    #[error("invalid layer '{layer}': {detail}")]
    InvalidLayer { layer: String, detail: String },

    /// The graph as a whole is malformed.
    #[error("invalid model graph: {0}")]
    InvalidGraph(String),
}
