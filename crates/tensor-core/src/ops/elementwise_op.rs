// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element-wise kernels.

use super::check_unary;
use crate::{DType, Tensor, TensorError, TensorView};

/// `output = max(input, 0)`.
pub fn relu(input: &TensorView<'_>, output: &mut Tensor<'_>) -> Result<(), TensorError> {
    check_unary("relu", input, output)?;
    let src = input.data::<f32>()?;
    let dst = output.data_mut::<f32>()?;
    for (d, &x) in dst.iter_mut().zip(src) {
        *d = x.max(0.0);
    }
    Ok(())
}

/// Adds a 1-D `bias` to every row of `output` in place.
///
/// `bias` must have as many elements as the last dimension of `output`.
pub fn add_bias(output: &mut Tensor<'_>, bias: &TensorView<'_>) -> Result<(), TensorError> {
    if bias.dtype() != DType::F32 {
        return Err(TensorError::UnsupportedDType {
            op: "add_bias",
            dtype: bias.dtype(),
        });
    }
    let width = output.shape().last_dim().unwrap_or(1);
    if bias.shape().rank() != 1 || bias.shape().num_elements() != width {
        return Err(TensorError::ShapeMismatch {
            op: "add_bias",
            lhs: output.shape().clone(),
            rhs: bias.shape().clone(),
        });
    }
    let b = bias.data::<f32>()?;
    if width == 0 {
        return Ok(());
    }
    for row in output.data_mut::<f32>()?.chunks_exact_mut(width) {
        for (x, &bj) in row.iter_mut().zip(b) {
            *x += bj;
        }
    }
    Ok(())
}
