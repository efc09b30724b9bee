// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON graph description.
//!
//! ```json
//! {
//!   "name": "net",
//!   "inputs":  [{ "name": "data", "shape": [1, 3, 224, 224], "layout": "NCHW" }],
//!   "outputs": [{ "name": "prob", "shape": [1, 1000] }],
//!   "layers": [
//!     { "name": "pool", "layer_type": "global_avg_pool" },
//!     { "name": "fc",   "layer_type": "linear", "weights": ["fc.weight", "fc.bias"] },
//!     { "name": "prob", "layer_type": "softmax" }
//!   ]
//! }
//! ```
//!
//! A layer reads the previous layer's activation unless `input` names
//! another one; an output reads the last layer unless `source` says otherwise.

use std::collections::HashSet;
use std::path::Path;

use tensor_core::{DType, Shape};

use crate::{LayerType, ModelError};

/// Top-level graph description.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelManifest {
    /// Model name; the loader falls back to the file stem.
    #[serde(default)]
    pub name: Option<String>,
    /// Explicit batch size, overriding what the input layout implies.
    #[serde(default)]
    pub batch: Option<usize>,
    pub inputs: Vec<ManifestPort>,
    pub outputs: Vec<ManifestPort>,
    #[serde(default)]
    pub layers: Vec<ManifestLayer>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestPort {
    pub name: String,
    pub shape: Shape,
    #[serde(default = "default_element_type")]
    pub element_type: String,
    #[serde(default)]
    pub layout: Option<String>,
    /// Outputs only: the activation to expose.
    #[serde(default)]
    pub source: Option<String>,
}

fn default_element_type() -> String {
    "f32".to_string()
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ManifestLayer {
    pub name: String,
    pub layer_type: String,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub weights: Vec<String>,
    #[serde(default)]
    pub out_features: Option<usize>,
    #[serde(default)]
    pub eps: Option<f32>,
}

impl ModelManifest {
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read(path)?;
        Self::from_slice(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Structural checks that need no shape information.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.inputs.is_empty() {
            return Err(ModelError::InvalidGraph("description declares no inputs".into()));
        }
        if self.outputs.is_empty() {
            return Err(ModelError::InvalidGraph("description declares no outputs".into()));
        }
        if self.batch == Some(0) {
            return Err(ModelError::InvalidGraph("batch must be positive".into()));
        }

        let mut ports = HashSet::new();
        for port in self.inputs.iter().chain(&self.outputs) {
            if !ports.insert(port.name.as_str()) {
                return Err(ModelError::InvalidGraph(format!(
                    "duplicate port name '{}'",
                    port.name
                )));
            }
            parse_dtype(&port.element_type)?;
        }

        let mut activations: HashSet<&str> = self.inputs.iter().map(|p| p.name.as_str()).collect();
        for layer in &self.layers {
            if !activations.insert(layer.name.as_str()) {
                return Err(ModelError::InvalidLayer {
                    layer: layer.name.clone(),
                    detail: "name collides with an input or earlier layer".into(),
                });
            }
            let layer_type =
                LayerType::from_str_loose(&layer.layer_type).ok_or_else(|| ModelError::InvalidLayer {
                    layer: layer.name.clone(),
                    detail: format!("unrecognised layer type '{}'", layer.layer_type),
                })?;
            let (required, max) = layer_type.weight_arity();
            let count = layer.weights.len();
            if count < required || count > max {
                return Err(ModelError::InvalidLayer {
                    layer: layer.name.clone(),
                    detail: format!("{layer_type} takes {required}..={max} weights, got {count}"),
                });
            }
        }
        Ok(())
    }
}

/// Parses an element type label.
pub(crate) fn parse_dtype(label: &str) -> Result<DType, ModelError> {
    DType::from_str_loose(label).ok_or_else(|| ModelError::UnsupportedDType(label.to_string()))
}
