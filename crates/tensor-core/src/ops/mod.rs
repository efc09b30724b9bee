// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reference f32 kernels.
//!
//! Every kernel writes into a caller-provided output tensor, which may wrap
//! pool-allocated or caller-owned memory, so the execution path performs
//! no allocation of its own.

mod elementwise_op;
mod gelu_op;
mod layer_norm_op;
mod matmul_op;
mod pool_op;
mod softmax_op;

pub use elementwise_op::{add_bias, relu};
pub use gelu_op::gelu;
pub use layer_norm_op::layer_norm;
pub use matmul_op::matmul;
pub use pool_op::global_avg_pool;
pub use softmax_op::softmax;

use crate::{DType, Tensor, TensorError, TensorView};

/// Checks that `input` and `output` are both f32 with identical shapes.
pub(crate) fn check_unary(
    op: &'static str,
    input: &TensorView<'_>,
    output: &Tensor<'_>,
) -> Result<(), TensorError> {
    for dtype in [input.dtype(), output.dtype()] {
        if dtype != DType::F32 {
            return Err(TensorError::UnsupportedDType { op, dtype });
        }
    }
    if input.shape() != output.shape() {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: input.shape().clone(),
            rhs: output.shape().clone(),
        });
    }
    Ok(())
}
