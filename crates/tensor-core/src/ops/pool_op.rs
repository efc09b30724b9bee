// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Global average pooling.

use crate::{DType, Tensor, TensorError, TensorView};

/// Averages every spatial position of an `[N, C, ...]` input into `[N, C]`.
///
/// A rank-2 input is copied through unchanged.
pub fn global_avg_pool(input: &TensorView<'_>, output: &mut Tensor<'_>) -> Result<(), TensorError> {
    if input.dtype() != DType::F32 {
        return Err(TensorError::UnsupportedDType {
            op: "global_avg_pool",
            dtype: input.dtype(),
        });
    }
    let expected = input.shape().pooled().ok_or_else(|| TensorError::ShapeMismatch {
        op: "global_avg_pool (rank < 2)",
        lhs: input.shape().clone(),
        rhs: output.shape().clone(),
    })?;
    if output.shape() != &expected {
        return Err(TensorError::ShapeMismatch {
            op: "global_avg_pool (output)",
            lhs: expected,
            rhs: output.shape().clone(),
        });
    }

    let src = input.data::<f32>()?;
    let dst = output.data_mut::<f32>()?;
    let spatial: usize = input.shape().dims()[2..].iter().product();
    if spatial == 0 {
        dst.iter_mut().for_each(|x| *x = 0.0);
        return Ok(());
    }
    let inv = 1.0 / spatial as f32;
    for (d, plane) in dst.iter_mut().zip(src.chunks_exact(spatial)) {
        *d = plane.iter().sum::<f32>() * inv;
    }
    Ok(())
}
