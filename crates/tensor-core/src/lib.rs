// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Typed, shaped tensor buffers for the inference runtime.
//!
//! This crate provides:
//! - [`Tensor`]: a row-major tensor that either owns its buffer or wraps
//!   caller memory for a lifetime `'a`.
//! - [`TensorView`]: a zero-copy read-only view.
//! - [`Shape`] and [`DType`] descriptors, plus the [`Element`] trait that
//!   gates typed access.
//! - Reference f32 kernels (matmul, softmax, layer norm, GELU, ReLU,
//!   bias add, global average pooling) used by the CPU device.
//!
//! # Design Goals
//! - Borrowed tensors cannot outlive the memory they wrap.
//! - Typed access never silently reinterprets bytes: a mismatched scalar
//!   type is a [`TensorError::TypeMismatch`].
//! - Kernels write into pre-allocated outputs.

mod dtype;
mod error;
mod ops;
mod shape;
mod tensor;

pub use dtype::{DType, Element};
pub use error::TensorError;
pub use half::{bf16, f16};
pub use ops::{add_bias, gelu, global_avg_pool, layer_norm, matmul, relu, softmax};
pub use shape::Shape;
pub use tensor::{Tensor, TensorView};
