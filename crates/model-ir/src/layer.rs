// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Layer and port definitions.

use tensor_core::{DType, Shape};

use crate::ModelError;

/// The kind of computation a layer performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    /// `y = x @ W (+ b)`; weights `[W: [K, N], b: [N]]`.
    Linear,
    Relu,
    Gelu,
    Softmax,
    /// Weights `[gamma, beta]`, each the length of the last dimension.
    LayerNorm,
    /// `[N, C, ...]` → `[N, C]`.
    GlobalAvgPool,
    /// `[N, ...]` → `[N, prod(...)]`.
    Flatten,
    Identity,
}

impl LayerType {
    /// Parses a layer type string, accepting common aliases.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" | "dense" | "fc" | "fully_connected" | "matmul" | "gemm" => Some(Self::Linear),
            "relu" => Some(Self::Relu),
            "gelu" => Some(Self::Gelu),
            "softmax" => Some(Self::Softmax),
            "layer_norm" | "layernorm" | "ln" => Some(Self::LayerNorm),
            "global_avg_pool" | "globalaveragepool" | "gap" => Some(Self::GlobalAvgPool),
            "flatten" | "reshape" => Some(Self::Flatten),
            "identity" | "noop" => Some(Self::Identity),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Relu => "relu",
            Self::Gelu => "gelu",
            Self::Softmax => "softmax",
            Self::LayerNorm => "layer_norm",
            Self::GlobalAvgPool => "global_avg_pool",
            Self::Flatten => "flatten",
            Self::Identity => "identity",
        }
    }

    /// Number of weight tensors the layer accepts, as `(required, max)`.
    pub fn weight_arity(&self) -> (usize, usize) {
        match self {
            Self::Linear => (1, 2),
            Self::LayerNorm => (2, 2),
            _ => (0, 0),
        }
    }

    /// Infers the output shape from the input shape.
    ///
    /// `weight_shapes` is empty when the model was loaded without weights;
    /// a linear layer then takes its width from `out_features`.
    pub fn infer_output(
        &self,
        layer: &str,
        input: &Shape,
        weight_shapes: &[Shape],
        out_features: Option<usize>,
    ) -> Result<Shape, ModelError> {
        let invalid = |detail: String| ModelError::InvalidLayer {
            layer: layer.to_string(),
            detail,
        };
        match self {
            Self::Identity | Self::Relu | Self::Gelu | Self::Softmax => Ok(input.clone()),
            Self::LayerNorm => {
                let width = input
                    .last_dim()
                    .ok_or_else(|| invalid("layer_norm needs rank >= 1".into()))?;
                for w in weight_shapes {
                    if w.dims() != [width] {
                        return Err(invalid(format!(
                            "norm parameter shape {w} does not match last dimension {width}"
                        )));
                    }
                }
                Ok(input.clone())
            }
            Self::Flatten => input
                .flattened()
                .ok_or_else(|| invalid("cannot flatten a scalar".into())),
            Self::GlobalAvgPool => input
                .pooled()
                .ok_or_else(|| invalid(format!("pooling needs [N, C, ...], got {input}"))),
            Self::Linear => {
                if input.rank() != 2 {
                    return Err(invalid(format!(
                        "linear expects a [M, K] input, got {input}; insert a flatten layer"
                    )));
                }
                let (m, k) = (input.dims()[0], input.dims()[1]);
                let n = match weight_shapes.first() {
                    Some(w) => {
                        if w.rank() != 2 || w.dims()[0] != k {
                            return Err(invalid(format!(
                                "weight shape {w} incompatible with input {input}"
                            )));
                        }
                        let n = w.dims()[1];
                        if let Some(bias) = weight_shapes.get(1) {
                            if bias.dims() != [n] {
                                return Err(invalid(format!(
                                    "bias shape {bias} does not match output width {n}"
                                )));
                            }
                        }
                        if out_features.is_some_and(|declared| declared != n) {
                            return Err(invalid(format!(
                                "out_features {} disagrees with weight width {n}",
                                out_features.unwrap_or_default()
                            )));
                        }
                        n
                    }
                    None => out_features.ok_or_else(|| {
                        invalid("no weights loaded and no out_features declared".into())
                    })?,
                };
                Ok(Shape::matrix(m, n))
            }
        }
    }
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named input or output of a model.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PortDef {
    pub name: String,
    pub shape: Shape,
    pub dtype: DType,
    /// Axis labels such as `"NCHW"`, when declared.
    pub layout: Option<String>,
    /// Activation the port reads from. For inputs this is the port's own name.
    pub source: String,
}

impl PortDef {
    pub fn size_bytes(&self) -> usize {
        self.shape.size_bytes(self.dtype)
    }
}

impl std::fmt::Display for PortDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} {}", self.name, self.dtype, self.shape)?;
        if let Some(layout) = &self.layout {
            write!(f, " ({layout})")?;
        }
        Ok(())
    }
}

/// A single resolved layer: its type, dataflow edge, weights and shapes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LayerDef {
    pub name: String,
    pub layer_type: LayerType,
    /// Position in execution order.
    pub index: usize,
    /// Name of the activation this layer consumes.
    pub input: String,
    pub weight_names: Vec<String>,
    /// Shapes of the named weights; empty if the model has no weights.
    pub weight_shapes: Vec<Shape>,
    pub dtype: DType,
    pub input_shape: Shape,
    pub output_shape: Shape,
    /// Normalization epsilon.
    pub eps: f32,
}

impl LayerDef {
    pub fn estimated_weight_bytes(&self) -> usize {
        self.weight_shapes
            .iter()
            .map(|s| s.size_bytes(self.dtype))
            .sum()
    }

    /// Bytes of the activation this layer produces.
    pub fn estimated_activation_bytes(&self) -> usize {
        self.output_shape.size_bytes(self.dtype)
    }

    pub fn summary(&self) -> String {
        format!(
            "[{}] {} ({}): {} -> {}, {} weight tensors",
            self.index,
            self.name,
            self.layer_type,
            self.input_shape,
            self.output_shape,
            self.weight_names.len(),
        )
    }
}
