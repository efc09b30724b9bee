// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Lowering a validated graph into a CPU execution program.
//!
//! The program owns copies of the weights it needs, so a compiled model does
//! not reach back into the model it came from. Identity layers are folded
//! away; every remaining layer writes into its own activation slot, and
//! slot `i` is only ever read by steps after `i`.

use std::collections::HashMap;
use std::time::Instant;

use memory_manager::BufferGuard;
use model_ir::graph::Validated;
use model_ir::{LayerDef, LayerType, ModelGraph, PortDef, WeightStore};
use tensor_core::{
    add_bias, gelu, global_avg_pool, layer_norm, matmul, relu, softmax, DType, Shape, Tensor,
    TensorError, TensorView,
};

use crate::plugin::{ExecutionOutput, TensorMap};
use crate::profiling::ProfilingReport;
use crate::RuntimeError;

/// Where a step reads its input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operand {
    Input(usize),
    Activation(usize),
}

#[derive(Debug)]
enum Op {
    Linear {
        weight: Tensor<'static>,
        bias: Option<Tensor<'static>>,
    },
    Relu,
    Gelu,
    Softmax,
    LayerNorm {
        gamma: Tensor<'static>,
        beta: Tensor<'static>,
        eps: f32,
    },
    GlobalAvgPool,
    Flatten,
}

#[derive(Debug)]
struct Step {
    name: String,
    layer_type: LayerType,
    op: Op,
    input: Operand,
    input_shape: Shape,
    output_shape: Shape,
}

impl Step {
    fn run(&self, input: &TensorView<'_>, output: &mut Tensor<'_>) -> Result<(), TensorError> {
        match &self.op {
            Op::Linear { weight, bias } => {
                matmul(input, &weight.view(), output)?;
                if let Some(bias) = bias {
                    add_bias(output, &bias.view())?;
                }
                Ok(())
            }
            Op::Relu => relu(input, output),
            Op::Gelu => gelu(input, output),
            Op::Softmax => softmax(input, output),
            Op::LayerNorm { gamma, beta, eps } => {
                layer_norm(input, &gamma.view(), &beta.view(), *eps, output)
            }
            Op::GlobalAvgPool => global_avg_pool(input, output),
            Op::Flatten => {
                output.as_bytes_mut()?.copy_from_slice(input.as_bytes());
                Ok(())
            }
        }
    }
}

#[derive(Debug)]
struct OutputBinding {
    port: PortDef,
    operand: Operand,
}

/// A graph lowered for the reference CPU kernels.
#[derive(Debug)]
pub(crate) struct CpuProgram {
    device: String,
    name: String,
    inputs: Vec<PortDef>,
    outputs: Vec<OutputBinding>,
    steps: Vec<Step>,
    folded: usize,
}

impl CpuProgram {
    /// Lowers `graph`, taking weights from `weights`.
    ///
    /// # Errors
    /// [`RuntimeError::Compilation`] for non-f32 ports, layers or weights, and
    /// for layers whose weights were not loaded.
    pub(crate) fn compile(
        device: &str,
        graph: &ModelGraph<Validated>,
        weights: Option<&WeightStore>,
    ) -> Result<Self, RuntimeError> {
        let fail = |detail: String| RuntimeError::Compilation {
            device: device.to_string(),
            detail,
        };

        for port in graph.inputs.iter().chain(&graph.outputs) {
            if port.dtype != DType::F32 {
                return Err(fail(format!(
                    "port '{}' is {}; this device only executes f32",
                    port.name, port.dtype
                )));
            }
        }

        let mut resolved: HashMap<&str, Operand> = graph
            .inputs
            .iter()
            .enumerate()
            .map(|(i, port)| (port.name.as_str(), Operand::Input(i)))
            .collect();
        let mut steps = Vec::with_capacity(graph.num_layers());
        let mut folded = 0;

        for layer in graph.iter_layers() {
            if layer.dtype != DType::F32 {
                return Err(fail(format!(
                    "layer '{}' computes in {}; this device only executes f32",
                    layer.name, layer.dtype
                )));
            }
            let input = *resolved
                .get(layer.input.as_str())
                .ok_or_else(|| fail(format!("layer '{}' reads unknown '{}'", layer.name, layer.input)))?;

            let op = match layer.layer_type {
                LayerType::Identity => {
                    resolved.insert(&layer.name, input);
                    folded += 1;
                    continue;
                }
                LayerType::Linear => Op::Linear {
                    weight: weight(weights, layer, 0).map_err(fail)?,
                    bias: match layer.weight_names.len() {
                        0 | 1 => None,
                        _ => Some(weight(weights, layer, 1).map_err(fail)?),
                    },
                },
                LayerType::LayerNorm => Op::LayerNorm {
                    gamma: weight(weights, layer, 0).map_err(fail)?,
                    beta: weight(weights, layer, 1).map_err(fail)?,
                    eps: layer.eps,
                },
                LayerType::Relu => Op::Relu,
                LayerType::Gelu => Op::Gelu,
                LayerType::Softmax => Op::Softmax,
                LayerType::GlobalAvgPool => Op::GlobalAvgPool,
                LayerType::Flatten => Op::Flatten,
            };

            resolved.insert(&layer.name, Operand::Activation(steps.len()));
            steps.push(Step {
                name: layer.name.clone(),
                layer_type: layer.layer_type,
                op,
                input,
                input_shape: layer.input_shape.clone(),
                output_shape: layer.output_shape.clone(),
            });
        }

        let outputs = graph
            .outputs
            .iter()
            .map(|port| {
                let operand = *resolved.get(port.source.as_str()).ok_or_else(|| {
                    fail(format!("output '{}' reads unknown '{}'", port.name, port.source))
                })?;
                Ok(OutputBinding {
                    port: port.clone(),
                    operand,
                })
            })
            .collect::<Result<Vec<_>, RuntimeError>>()?;

        Ok(Self {
            device: device.to_string(),
            name: graph.name.clone(),
            inputs: graph.inputs.clone(),
            outputs,
            steps,
            folded,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn num_steps(&self) -> usize {
        self.steps.len()
    }

    /// Layers removed during lowering.
    pub(crate) fn folded_layers(&self) -> usize {
        self.folded
    }

    /// Byte size of every activation slot, in step order.
    pub(crate) fn activation_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.steps.iter().map(|s| s.output_shape.size_bytes(DType::F32))
    }

    /// Runs every step against `inputs`, using `workspace` for activations.
    pub(crate) fn execute(
        &self,
        inputs: &TensorMap<'_>,
        workspace: &mut [BufferGuard],
        profiling: bool,
    ) -> Result<ExecutionOutput, RuntimeError> {
        let start = Instant::now();
        if workspace.len() != self.steps.len() {
            return Err(RuntimeError::inference(
                &self.device,
                format!(
                    "workspace has {} slots, program needs {}",
                    workspace.len(),
                    self.steps.len()
                ),
            ));
        }

        let bound = self
            .inputs
            .iter()
            .map(|port| {
                let tensor = inputs.get(&port.name).ok_or_else(|| {
                    RuntimeError::inference(&self.device, format!("input '{}' is not bound", port.name))
                })?;
                if tensor.dtype() != port.dtype || tensor.shape() != &port.shape {
                    return Err(RuntimeError::inference(
                        &self.device,
                        format!(
                            "input '{}' expects {} {}, got {} {}",
                            port.name,
                            port.dtype,
                            port.shape,
                            tensor.dtype(),
                            tensor.shape()
                        ),
                    ));
                }
                Ok(tensor.view())
            })
            .collect::<Result<Vec<_>, RuntimeError>>()?;

        let mut report = ProfilingReport::new();
        for (i, step) in self.steps.iter().enumerate() {
            let (done, rest) = workspace.split_at_mut(i);
            let input = match step.input {
                Operand::Input(j) => bound[j],
                Operand::Activation(k) => {
                    TensorView::from_parts(&step.input_shape, DType::F32, done[k].as_slice())?
                }
            };
            let mut output =
                Tensor::from_external_mut(step.output_shape.clone(), DType::F32, rest[0].as_mut_slice())?;

            let began = Instant::now();
            step.run(&input, &mut output).map_err(|e| {
                RuntimeError::inference(&self.device, format!("layer '{}': {e}", step.name))
            })?;
            if profiling {
                report.record_layer(
                    &step.name,
                    step.layer_type.as_str(),
                    began.elapsed(),
                    output.size_bytes(),
                );
            }
        }

        let mut outputs = TensorMap::new();
        for binding in &self.outputs {
            let bytes = match binding.operand {
                Operand::Input(j) => bound[j].as_bytes(),
                Operand::Activation(k) => workspace[k].as_slice(),
            };
            let tensor = Tensor::from_bytes(binding.port.shape.clone(), binding.port.dtype, bytes)?;
            outputs.insert(binding.port.name.clone(), tensor);
        }

        report.finalise(start.elapsed());
        tracing::debug!(
            model = %self.name,
            elapsed_us = report.total_duration.as_micros() as u64,
            "Run complete"
        );
        Ok(ExecutionOutput { outputs, report })
    }
}

/// Copies weight `slot` of `layer` out of the store.
fn weight(
    weights: Option<&WeightStore>,
    layer: &LayerDef,
    slot: usize,
) -> Result<Tensor<'static>, String> {
    let name = layer.weight_names.get(slot).ok_or_else(|| {
        format!(
            "layer '{}' ({}) declares no weight #{slot}",
            layer.name, layer.layer_type
        )
    })?;
    let store = weights.ok_or_else(|| {
        format!(
            "layer '{}' needs weight '{name}' but the model was read without weights",
            layer.name
        )
    })?;
    let tensor = store
        .get(name)
        .ok_or_else(|| format!("weight '{name}' of layer '{}' is missing", layer.name))?;
    if tensor.dtype() != DType::F32 {
        return Err(format!(
            "weight '{name}' is {}; this device only executes f32",
            tensor.dtype()
        ));
    }
    Ok(tensor.detach())
}
