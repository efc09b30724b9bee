// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor construction, access and kernels.

use crate::{DType, Shape};

/// Errors that can occur while building, accessing or computing on tensors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TensorError {
    /// An owned buffer's length does not equal the size implied by shape and dtype.
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// A borrowed buffer is smaller than the size implied by shape and dtype.
    #[error("buffer too small for {shape} {dtype}: need {required} bytes, capacity {capacity}")]
    BufferTooSmall {
        shape: Shape,
        dtype: DType,
        required: usize,
        capacity: usize,
    },

    /// Two tensors have incompatible shapes for the requested operation.
    #[error("incompatible shapes for {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// The requested data type is not supported for this operation.
    #[error("unsupported dtype {dtype} for operation {op}")]
    UnsupportedDType { op: &'static str, dtype: DType },

    /// Typed access requested with a scalar type that differs from the tensor's.
    #[error("type mismatch: tensor holds {actual}, accessed as {requested}")]
    TypeMismatch { actual: DType, requested: DType },

    /// Borrowed memory is not aligned for the element type.
    #[error("buffer at {addr:#x} is not aligned for {dtype}")]
    Misaligned { dtype: DType, addr: usize },

    /// Mutable access requested on a tensor that wraps read-only memory.
    #[error("tensor wraps read-only memory")]
    ReadOnly,
}
