// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Matrix multiplication.

use crate::{DType, Shape, Tensor, TensorError, TensorView};

/// Computes `output = lhs @ rhs` for 2-D f32 operands.
///
/// `lhs` is `[M, K]`, `rhs` is `[K, N]`, and `output` must already be `[M, N]`.
///
/// # Errors
/// [`TensorError::ShapeMismatch`] on incompatible dimensions,
/// [`TensorError::UnsupportedDType`] for anything other than f32.
pub fn matmul(
    lhs: &TensorView<'_>,
    rhs: &TensorView<'_>,
    output: &mut Tensor<'_>,
) -> Result<(), TensorError> {
    for dtype in [lhs.dtype(), rhs.dtype(), output.dtype()] {
        if dtype != DType::F32 {
            return Err(TensorError::UnsupportedDType { op: "matmul", dtype });
        }
    }
    if lhs.shape().rank() != 2 || !lhs.shape().is_matmul_compatible(rhs.shape()) {
        return Err(TensorError::ShapeMismatch {
            op: "matmul",
            lhs: lhs.shape().clone(),
            rhs: rhs.shape().clone(),
        });
    }

    let (m, k) = (lhs.shape().dims()[0], lhs.shape().dims()[1]);
    let n = rhs.shape().dims()[1];
    let expected = Shape::matrix(m, n);
    if output.shape() != &expected {
        return Err(TensorError::ShapeMismatch {
            op: "matmul (output)",
            lhs: expected,
            rhs: output.shape().clone(),
        });
    }

    let a = lhs.data::<f32>()?;
    let b = rhs.data::<f32>()?;
    let c = output.data_mut::<f32>()?;
    c.fill(0.0);

    // ikj order keeps the inner loop a contiguous saxpy over a row of C.
    for i in 0..m {
        let c_row = &mut c[i * n..(i + 1) * n];
        for p in 0..k {
            let a_ip = a[i * k + p];
            if a_ip == 0.0 {
                continue;
            }
            for (cj, &bj) in c_row.iter_mut().zip(&b[p * n..(p + 1) * n]) {
                *cj += a_ip * bj;
            }
        }
    }
    Ok(())
}
