// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Softmax activation.

use super::check_unary;
use crate::{Tensor, TensorError, TensorView};

/// Softmax along the last dimension, max-subtracted for numerical stability.
///
/// `input` and `output` must be f32 with the same shape.
pub fn softmax(input: &TensorView<'_>, output: &mut Tensor<'_>) -> Result<(), TensorError> {
    check_unary("softmax", input, output)?;
    let width = input.shape().last_dim().unwrap_or(1);
    if width == 0 {
        return Ok(());
    }

    let src = input.data::<f32>()?;
    let dst = output.data_mut::<f32>()?;
    for (row_src, row_dst) in src.chunks_exact(width).zip(dst.chunks_exact_mut(width)) {
        let max_val = row_src.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut sum = 0.0f32;
        for (d, &s) in row_dst.iter_mut().zip(row_src) {
            *d = (s - max_val).exp();
            sum += *d;
        }
        if sum > 0.0 {
            let inv_sum = sum.recip();
            row_dst.iter_mut().for_each(|d| *d *= inv_sum);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DType, Shape};

    fn approx_eq(a: &[f32], b: &[f32], tol: f32) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < tol)
    }

    #[test]
    fn test_softmax_uniform() {
        let input = Tensor::from_f32(Shape::vector(4), &[1.0; 4]).unwrap();
        let mut output = Tensor::zeros(Shape::vector(4), DType::F32);
        softmax(&input.view(), &mut output).unwrap();
        assert!(approx_eq(output.data::<f32>().unwrap(), &[0.25; 4], 1e-6));
    }

    #[test]
    fn test_softmax_scalar_is_one() {
        let input = Tensor::from_f32(Shape::scalar(), &[42.0]).unwrap();
        let mut output = Tensor::zeros(Shape::scalar(), DType::F32);
        softmax(&input.view(), &mut output).unwrap();
        assert_eq!(output.data::<f32>().unwrap(), &[1.0]);
    }

    #[test]
    fn test_softmax_rows_independent() {
        let input = Tensor::from_f32(Shape::matrix(2, 3), &[1.0, 2.0, 3.0, 5.0, 5.0, 5.0]).unwrap();
        let mut output = Tensor::zeros(Shape::matrix(2, 3), DType::F32);
        softmax(&input.view(), &mut output).unwrap();

        let r = output.data::<f32>().unwrap();
        assert!((r[0..3].iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(r[0] < r[1] && r[1] < r[2]);
        assert!(approx_eq(&r[3..6], &[1.0 / 3.0; 3], 1e-5));
    }

    #[test]
    fn test_softmax_large_values_stay_finite() {
        let input = Tensor::from_f32(Shape::vector(3), &[1000.0, 1001.0, 1002.0]).unwrap();
        let mut output = Tensor::zeros(Shape::vector(3), DType::F32);
        softmax(&input.view(), &mut output).unwrap();

        let r = output.data::<f32>().unwrap();
        assert!(r.iter().all(|x| x.is_finite()));
        assert!((r.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }
}
