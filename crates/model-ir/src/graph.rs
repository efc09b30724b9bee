// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model graph with type-state validation.
//!
//! A graph is built as `ModelGraph<Loaded>` from a description, with shapes
//! inferred layer by layer, and must pass [`ModelGraph::validate`] before the
//! runtime accepts it:
//!
//! ```text
//! ModelGraph<Loaded>  ──validate()──►  ModelGraph<Validated>
//! ```

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use tensor_core::{DType, Shape};

use crate::manifest::{parse_dtype, ModelManifest};
use crate::{LayerDef, LayerType, ModelError, PortDef, WeightStore};

/// Epsilon used by normalization layers that do not declare one.
pub const DEFAULT_EPS: f32 = 1e-5;

#[derive(Debug, Clone)]
pub struct Loaded;

#[derive(Debug, Clone)]
pub struct Validated;

pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Loaded {}
impl GraphState for Validated {}

/// Inputs, outputs and an ordered list of layers.
#[derive(Debug, Clone)]
pub struct ModelGraph<S: GraphState = Loaded> {
    pub name: String,
    pub batch: Option<usize>,
    pub inputs: Vec<PortDef>,
    pub outputs: Vec<PortDef>,
    pub layers: Vec<LayerDef>,
    _state: PhantomData<S>,
}

impl ModelGraph<Loaded> {
    pub fn new(
        name: String,
        inputs: Vec<PortDef>,
        outputs: Vec<PortDef>,
        layers: Vec<LayerDef>,
    ) -> Self {
        Self {
            name,
            batch: None,
            inputs,
            outputs,
            layers,
            _state: PhantomData,
        }
    }

    /// Resolves a description into layers with concrete shapes.
    ///
    /// With `weights` present every referenced weight must exist and its
    /// shape participates in inference; without, the graph is topology only.
    pub fn from_manifest(
        manifest: &ModelManifest,
        fallback_name: &str,
        weights: Option<&WeightStore>,
    ) -> Result<Self, ModelError> {
        manifest.validate()?;

        let mut activations: HashMap<String, (Shape, DType)> = HashMap::new();
        let mut inputs = Vec::with_capacity(manifest.inputs.len());
        for port in &manifest.inputs {
            let dtype = parse_dtype(&port.element_type)?;
            activations.insert(port.name.clone(), (port.shape.clone(), dtype));
            inputs.push(PortDef {
                name: port.name.clone(),
                shape: port.shape.clone(),
                dtype,
                layout: port.layout.clone(),
                source: port.name.clone(),
            });
        }

        let mut layers = Vec::with_capacity(manifest.layers.len());
        let mut previous = inputs[0].name.clone();
        for (index, ml) in manifest.layers.iter().enumerate() {
            let layer_type = LayerType::from_str_loose(&ml.layer_type).ok_or_else(|| {
                ModelError::InvalidLayer {
                    layer: ml.name.clone(),
                    detail: format!("unrecognised layer type '{}'", ml.layer_type),
                }
            })?;
            let input = ml.input.clone().unwrap_or_else(|| previous.clone());
            let (input_shape, dtype) =
                activations
                    .get(&input)
                    .cloned()
                    .ok_or_else(|| ModelError::InvalidLayer {
                        layer: ml.name.clone(),
                        detail: format!("input '{input}' is not produced before this layer"),
                    })?;

            let weight_shapes = match weights {
                Some(store) => ml
                    .weights
                    .iter()
                    .map(|w| {
                        store
                            .get(w)
                            .map(|t| t.shape().clone())
                            .ok_or_else(|| ModelError::WeightNotFound { name: w.clone() })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            let output_shape =
                layer_type.infer_output(&ml.name, &input_shape, &weight_shapes, ml.out_features)?;

            activations.insert(ml.name.clone(), (output_shape.clone(), dtype));
            previous = ml.name.clone();
            layers.push(LayerDef {
                name: ml.name.clone(),
                layer_type,
                index,
                input,
                weight_names: ml.weights.clone(),
                weight_shapes,
                dtype,
                input_shape,
                output_shape,
                eps: ml.eps.unwrap_or(DEFAULT_EPS),
            });
        }

        let outputs = manifest
            .outputs
            .iter()
            .map(|port| {
                Ok(PortDef {
                    name: port.name.clone(),
                    shape: port.shape.clone(),
                    dtype: parse_dtype(&port.element_type)?,
                    layout: port.layout.clone(),
                    source: port.source.clone().unwrap_or_else(|| previous.clone()),
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        let name = manifest
            .name
            .clone()
            .unwrap_or_else(|| fallback_name.to_string());
        let mut graph = Self::new(name, inputs, outputs, layers);
        graph.batch = manifest.batch;
        Ok(graph)
    }

    /// Checks dataflow and shape consistency, producing a validated graph.
    pub fn validate(self) -> Result<ModelGraph<Validated>, ModelError> {
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(ModelError::InvalidGraph(
                "a model needs at least one input and one output".into(),
            ));
        }

        let mut activations: HashMap<&str, (&Shape, DType)> = HashMap::new();
        for port in &self.inputs {
            if port.shape.is_empty() {
                return Err(ModelError::InvalidGraph(format!(
                    "input '{}' has a zero dimension: {}",
                    port.name, port.shape
                )));
            }
            if activations
                .insert(&port.name, (&port.shape, port.dtype))
                .is_some()
            {
                return Err(ModelError::InvalidGraph(format!(
                    "duplicate input '{}'",
                    port.name
                )));
            }
        }

        for (i, layer) in self.layers.iter().enumerate() {
            let invalid = |detail: String| ModelError::InvalidLayer {
                layer: layer.name.clone(),
                detail,
            };
            if layer.index != i {
                return Err(invalid(format!("expected index {i}, got {}", layer.index)));
            }
            match activations.get(layer.input.as_str()) {
                Some((shape, _)) if **shape == layer.input_shape => {}
                Some((shape, _)) => {
                    return Err(invalid(format!(
                        "declared input shape {} but '{}' is {shape}",
                        layer.input_shape, layer.input
                    )))
                }
                None => return Err(invalid(format!("unknown input '{}'", layer.input))),
            }
            if layer.output_shape.is_empty() {
                return Err(invalid("output shape has zero elements".into()));
            }
            if activations
                .insert(&layer.name, (&layer.output_shape, layer.dtype))
                .is_some()
            {
                return Err(invalid("duplicate activation name".into()));
            }
        }

        for port in &self.outputs {
            if self.inputs.iter().any(|p| p.name == port.name) {
                return Err(ModelError::InvalidGraph(format!(
                    "'{}' is both an input and an output",
                    port.name
                )));
            }
            let (shape, dtype) = activations.get(port.source.as_str()).ok_or_else(|| {
                ModelError::InvalidGraph(format!(
                    "output '{}' reads unknown activation '{}'",
                    port.name, port.source
                ))
            })?;
            if **shape != port.shape || *dtype != port.dtype {
                return Err(ModelError::InvalidGraph(format!(
                    "output '{}' declared {} {} but '{}' produces {dtype} {shape}",
                    port.name, port.dtype, port.shape, port.source
                )));
            }
        }

        Ok(ModelGraph {
            name: self.name,
            batch: self.batch,
            inputs: self.inputs,
            outputs: self.outputs,
            layers: self.layers,
            _state: PhantomData,
        })
    }
}

impl ModelGraph<Validated> {
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn input(&self, name: &str) -> Option<&PortDef> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&PortDef> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Batch size: the explicit `batch`, else the `N` axis of the first
    /// input's layout, else its leading dimension.
    pub fn batch_size(&self) -> usize {
        if let Some(batch) = self.batch {
            return batch;
        }
        let first = &self.inputs[0];
        let axis = first
            .layout
            .as_deref()
            .and_then(|layout| layout.to_ascii_uppercase().find('N'))
            .unwrap_or(0);
        first.shape.dim(axis).unwrap_or(1)
    }

    /// Every weight name referenced by a layer, in execution order.
    pub fn weight_names(&self) -> impl Iterator<Item = &str> {
        self.layers
            .iter()
            .flat_map(|l| l.weight_names.iter().map(String::as_str))
    }

    pub fn total_weight_bytes(&self) -> usize {
        self.layers.iter().map(|l| l.estimated_weight_bytes()).sum()
    }

    pub fn total_activation_bytes(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.estimated_activation_bytes())
            .sum()
    }

    pub fn iter_layers(&self) -> impl Iterator<Item = &LayerDef> {
        self.layers.iter()
    }

    pub fn layer(&self, index: usize) -> Option<&LayerDef> {
        self.layers.get(index)
    }

    pub fn summary(&self) -> String {
        format!(
            "Model '{}': {} inputs, {} outputs, {} layers, {:.1} KB weights",
            self.name,
            self.inputs.len(),
            self.outputs.len(),
            self.num_layers(),
            self.total_weight_bytes() as f64 / 1024.0,
        )
    }
}

impl<S: GraphState> fmt::Display for ModelGraph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ModelGraph '{}':", self.name)?;
        for port in &self.inputs {
            writeln!(f, "  in  {port}")?;
        }
        for layer in &self.layers {
            writeln!(f, "  {}", layer.summary())?;
        }
        for port in &self.outputs {
            writeln!(f, "  out {port}")?;
        }
        Ok(())
    }
}
