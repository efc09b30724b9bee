// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Layer normalization.

use super::check_unary;
use crate::{Tensor, TensorError, TensorView};

/// Normalizes over the last dimension: `gamma * (x - mean) / sqrt(var + eps) + beta`.
///
/// `gamma` and `beta` are 1-D with the length of the last input dimension.
pub fn layer_norm(
    input: &TensorView<'_>,
    gamma: &TensorView<'_>,
    beta: &TensorView<'_>,
    eps: f32,
    output: &mut Tensor<'_>,
) -> Result<(), TensorError> {
    check_unary("layer_norm", input, output)?;
    let width = input
        .shape()
        .last_dim()
        .ok_or_else(|| TensorError::ShapeMismatch {
            op: "layer_norm (scalar input)",
            lhs: input.shape().clone(),
            rhs: gamma.shape().clone(),
        })?;
    for (param, op) in [(gamma, "layer_norm (gamma)"), (beta, "layer_norm (beta)")] {
        if param.shape().rank() != 1 || param.shape().num_elements() != width {
            return Err(TensorError::ShapeMismatch {
                op,
                lhs: param.shape().clone(),
                rhs: input.shape().clone(),
            });
        }
    }
    if width == 0 {
        return Ok(());
    }

    let g = gamma.data::<f32>()?;
    let b = beta.data::<f32>()?;
    let src = input.data::<f32>()?;
    let dst = output.data_mut::<f32>()?;
    let n = width as f32;
    for (row_src, row_dst) in src.chunks_exact(width).zip(dst.chunks_exact_mut(width)) {
        let mean = row_src.iter().sum::<f32>() / n;
        let var = row_src.iter().map(|&x| (x - mean) * (x - mean)).sum::<f32>() / n;
        let inv_std = (var + eps).sqrt().recip();
        for (j, d) in row_dst.iter_mut().enumerate() {
            *d = g[j] * (row_src[j] - mean) * inv_std + b[j];
        }
    }
    Ok(())
}
