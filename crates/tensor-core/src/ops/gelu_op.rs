// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! GELU activation (tanh approximation).

use super::check_unary;
use crate::{Tensor, TensorError, TensorView};

/// `sqrt(2/π)`.
const SQRT_2_OVER_PI: f32 = 0.797_884_6;
const GELU_COEFF: f32 = 0.044_715;

/// `GELU(x) ≈ 0.5 * x * (1 + tanh(sqrt(2/π) * (x + 0.044715 * x³)))`, element-wise.
pub fn gelu(input: &TensorView<'_>, output: &mut Tensor<'_>) -> Result<(), TensorError> {
    check_unary("gelu", input, output)?;
    let src = input.data::<f32>()?;
    for (d, &x) in output.data_mut::<f32>()?.iter_mut().zip(src) {
        *d = gelu_scalar(x);
    }
    Ok(())
}

#[inline(always)]
fn gelu_scalar(x: f32) -> f32 {
    let inner = SQRT_2_OVER_PI * (x + GELU_COEFF * x * x * x);
    0.5 * x * (1.0 + inner.tanh())
}
