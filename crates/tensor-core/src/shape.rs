// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor shape descriptors.

use std::fmt;

/// Ordered dimension sizes of a [`crate::Tensor`], row-major.
///
/// Serialises as a bare JSON array (`[1, 3, 224, 224]`) so graph
/// descriptions can embed shapes directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Creates a new shape from the given dimensions.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::new(vec![1, 3, 224, 224]);
    /// assert_eq!(s.rank(), 4);
    /// assert_eq!(s.num_elements(), 150_528);
    /// ```
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Rank-0 shape.
    pub fn scalar() -> Self {
        Self { dims: vec![] }
    }

    pub fn vector(len: usize) -> Self {
        Self { dims: vec![len] }
    }

    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self {
            dims: vec![rows, cols],
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Total element count; 1 for a scalar.
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Size of dimension `index`, or `None` if out of bounds.
    pub fn dim(&self, index: usize) -> Option<usize> {
        self.dims.get(index).copied()
    }

    /// Innermost dimension, the axis row-wise kernels iterate over.
    pub fn last_dim(&self) -> Option<usize> {
        self.dims.last().copied()
    }

    /// Bytes needed to hold this shape at the given element type.
    pub fn size_bytes(&self, dtype: super::DType) -> usize {
        self.num_elements() * dtype.size_bytes()
    }

    /// `true` if any dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    /// Collapses everything after the leading axis: `[N, a, b, ...]` → `[N, a*b*...]`.
    ///
    /// Returns `None` for a scalar.
    pub fn flattened(&self) -> Option<Shape> {
        let (&lead, rest) = self.dims.split_first()?;
        Some(Shape::matrix(lead, rest.iter().product()))
    }

    /// Drops the spatial axes of an `[N, C, ...]` shape, leaving `[N, C]`.
    ///
    /// Returns `None` when the rank is below 2.
    pub fn pooled(&self) -> Option<Shape> {
        if self.rank() < 2 {
            return None;
        }
        Some(Shape::matrix(self.dims[0], self.dims[1]))
    }

    /// `true` if `self` is `[..., M, K]` and `other` is `[..., K, N]`.
    pub fn is_matmul_compatible(&self, other: &Shape) -> bool {
        if self.rank() < 2 || other.rank() < 2 {
            return false;
        }
        self.dims[self.rank() - 1] == other.dims[other.rank() - 2]
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Self::new(dims.to_vec())
    }
}
