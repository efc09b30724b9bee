// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Core tensor type and view abstractions.

use std::fmt;

use crate::{DType, Element, Shape, TensorError};

/// Backing memory of a [`Tensor`].
///
/// Owned storage is kept as `u64` words so every supported element type
/// is correctly aligned without `unsafe`.
enum Storage<'a> {
    Owned { words: Vec<u64>, len: usize },
    Borrowed(&'a [u8]),
    BorrowedMut(&'a mut [u8]),
}

impl Storage<'_> {
    fn zeroed(len: usize) -> Storage<'static> {
        Storage::Owned {
            words: vec![0u64; len.div_ceil(8)],
            len,
        }
    }

    fn copied(bytes: &[u8]) -> Storage<'static> {
        let mut storage = Storage::zeroed(bytes.len());
        if let Storage::Owned { words, len } = &mut storage {
            bytemuck::cast_slice_mut::<u64, u8>(words)[..*len].copy_from_slice(bytes);
        }
        storage
    }

    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Owned { words, len } => &bytemuck::cast_slice::<u64, u8>(words)[..*len],
            Storage::Borrowed(bytes) => bytes,
            Storage::BorrowedMut(bytes) => bytes,
        }
    }

    fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            Storage::Owned { words, len } => {
                Some(&mut bytemuck::cast_slice_mut::<u64, u8>(words)[..*len])
            }
            Storage::Borrowed(_) => None,
            Storage::BorrowedMut(bytes) => Some(&mut **bytes),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Storage::Owned { .. } => "owned",
            Storage::Borrowed(_) => "borrowed",
            Storage::BorrowedMut(_) => "borrowed-mut",
        }
    }
}

/// An n-dimensional tensor over owned or borrowed contiguous memory.
///
/// The lifetime `'a` ties a tensor to memory it does not own: a tensor built
/// with [`from_external`](Tensor::from_external) cannot outlive the caller's
/// buffer. Owned tensors are `Tensor<'static>` and coerce to any `'a`.
///
/// # Memory Layout
/// Data is row-major (C order). Typed access goes through [`data`](Tensor::data),
/// which refuses to reinterpret bytes as a scalar type other than the tensor's.
///
/// # Examples
/// ```
/// use tensor_core::{DType, Shape, Tensor, TensorError};
///
/// let mut pixels = vec![0.5f32; 6];
/// let t = Tensor::from_external_slice_mut(Shape::matrix(2, 3), &mut pixels).unwrap();
/// assert_eq!(t.size(), 6);
/// assert_eq!(t.data::<f32>().unwrap()[0], 0.5);
/// assert!(matches!(t.data::<i32>(), Err(TensorError::TypeMismatch { .. })));
/// ```
pub struct Tensor<'a> {
    shape: Shape,
    dtype: DType,
    storage: Storage<'a>,
}

impl<'a> Tensor<'a> {
    /// Creates an owned tensor filled with zeros.
    ///
    /// ```
    /// use tensor_core::{Tensor, Shape, DType};
    /// let t = Tensor::zeros(Shape::matrix(2, 3), DType::F32);
    /// assert_eq!(t.size_bytes(), 24);
    /// ```
    pub fn zeros(shape: Shape, dtype: DType) -> Self {
        let len = shape.size_bytes(dtype);
        Self {
            shape,
            dtype,
            storage: Storage::zeroed(len),
        }
    }

    /// Creates an owned tensor by copying raw bytes.
    ///
    /// The byte count must equal `shape.size_bytes(dtype)` exactly.
    pub fn from_bytes(shape: Shape, dtype: DType, data: &[u8]) -> Result<Self, TensorError> {
        let expected = shape.size_bytes(dtype);
        if data.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            shape,
            dtype,
            storage: Storage::copied(data),
        })
    }

    /// Creates an owned tensor by copying typed values.
    pub fn from_slice<T: Element>(shape: Shape, values: &[T]) -> Result<Self, TensorError> {
        Self::from_bytes(shape, T::DTYPE, bytemuck::cast_slice(values))
    }

    /// Creates an owned `f32` tensor.
    ///
    /// ```
    /// use tensor_core::{Tensor, Shape};
    /// let t = Tensor::from_f32(Shape::vector(3), &[1.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(t.data::<f32>().unwrap(), &[1.0, 2.0, 3.0]);
    /// ```
    pub fn from_f32(shape: Shape, values: &[f32]) -> Result<Self, TensorError> {
        Self::from_slice(shape, values)
    }

    /// Wraps caller-owned, read-only memory without copying.
    ///
    /// The buffer may be larger than required; only the leading
    /// `shape.size_bytes(dtype)` bytes are addressed.
    pub fn from_external(shape: Shape, dtype: DType, data: &'a [u8]) -> Result<Self, TensorError> {
        let required = check_capacity(&shape, dtype, data.len())?;
        Ok(Self {
            shape,
            dtype,
            storage: Storage::Borrowed(&data[..required]),
        })
    }

    /// Wraps caller-owned, writable memory without copying.
    pub fn from_external_mut(
        shape: Shape,
        dtype: DType,
        data: &'a mut [u8],
    ) -> Result<Self, TensorError> {
        let required = check_capacity(&shape, dtype, data.len())?;
        Ok(Self {
            shape,
            dtype,
            storage: Storage::BorrowedMut(&mut data[..required]),
        })
    }

    /// Wraps a caller-owned typed array without copying.
    pub fn from_external_slice<T: Element>(shape: Shape, data: &'a [T]) -> Result<Self, TensorError> {
        Self::from_external(shape, T::DTYPE, bytemuck::cast_slice(data))
    }

    /// Wraps a caller-owned, writable typed array without copying.
    pub fn from_external_slice_mut<T: Element>(
        shape: Shape,
        data: &'a mut [T],
    ) -> Result<Self, TensorError> {
        Self::from_external_mut(shape, T::DTYPE, bytemuck::cast_slice_mut(data))
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.shape.num_elements()
    }

    /// Memory footprint in bytes.
    pub fn size_bytes(&self) -> usize {
        self.shape.size_bytes(self.dtype)
    }

    /// `true` if the tensor owns its buffer.
    pub fn is_owned(&self) -> bool {
        matches!(self.storage, Storage::Owned { .. })
    }

    /// `true` unless the tensor wraps read-only caller memory.
    pub fn is_writable(&self) -> bool {
        !matches!(self.storage, Storage::Borrowed(_))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.storage.bytes()
    }

    /// Mutable bytes; fails with [`TensorError::ReadOnly`] on read-only memory.
    pub fn as_bytes_mut(&mut self) -> Result<&mut [u8], TensorError> {
        self.storage.bytes_mut().ok_or(TensorError::ReadOnly)
    }

    /// Typed read access.
    ///
    /// # Errors
    /// [`TensorError::TypeMismatch`] if `T` is not the tensor's element type;
    /// [`TensorError::Misaligned`] if borrowed memory is not aligned for `T`.
    pub fn data<T: Element>(&self) -> Result<&[T], TensorError> {
        cast(self.dtype, self.storage.bytes())
    }

    /// Typed write access.
    pub fn data_mut<T: Element>(&mut self) -> Result<&mut [T], TensorError> {
        let dtype = self.dtype;
        if T::DTYPE != dtype {
            return Err(TensorError::TypeMismatch {
                actual: dtype,
                requested: T::DTYPE,
            });
        }
        let bytes = self.storage.bytes_mut().ok_or(TensorError::ReadOnly)?;
        let addr = bytes.as_ptr() as usize;
        bytemuck::try_cast_slice_mut(bytes).map_err(|_| TensorError::Misaligned { dtype, addr })
    }

    /// Sets every element to `value`.
    pub fn fill<T: Element>(&mut self, value: T) -> Result<(), TensorError> {
        self.data_mut::<T>()?.iter_mut().for_each(|x| *x = value);
        Ok(())
    }

    /// Overwrites this tensor's contents with `src`, which must match in shape and dtype.
    pub fn copy_from(&mut self, src: &TensorView<'_>) -> Result<(), TensorError> {
        if src.dtype() != self.dtype {
            return Err(TensorError::TypeMismatch {
                actual: self.dtype,
                requested: src.dtype(),
            });
        }
        if src.shape() != &self.shape {
            return Err(TensorError::ShapeMismatch {
                op: "copy_from",
                lhs: self.shape.clone(),
                rhs: src.shape().clone(),
            });
        }
        self.as_bytes_mut()?.copy_from_slice(src.as_bytes());
        Ok(())
    }

    /// Returns an immutable view over this tensor's data.
    pub fn view(&self) -> TensorView<'_> {
        TensorView {
            shape: &self.shape,
            dtype: self.dtype,
            data: self.storage.bytes(),
        }
    }

    /// Copies the contents into owned storage, detaching from any borrowed memory.
    pub fn detach(&self) -> Tensor<'static> {
        Tensor {
            shape: self.shape.clone(),
            dtype: self.dtype,
            storage: Storage::copied(self.storage.bytes()),
        }
    }
}

/// Read-only borrowed memory stays borrowed; everything else is copied.
impl<'a> Clone for Tensor<'a> {
    fn clone(&self) -> Self {
        match &self.storage {
            Storage::Borrowed(bytes) => Tensor {
                shape: self.shape.clone(),
                dtype: self.dtype,
                storage: Storage::Borrowed(*bytes),
            },
            _ => self.detach(),
        }
    }
}

impl fmt::Debug for Tensor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("dtype", &self.dtype)
            .field("storage", &self.storage.kind())
            .finish()
    }
}

/// A borrowed, read-only view over tensor data.
///
/// Views are zero-copy and tied to the lifetime of their source.
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
    shape: &'a Shape,
    dtype: DType,
    data: &'a [u8],
}

impl<'a> TensorView<'a> {
    /// Builds a view from raw parts; `data` must cover `shape` at `dtype`.
    pub fn from_parts(shape: &'a Shape, dtype: DType, data: &'a [u8]) -> Result<Self, TensorError> {
        let required = check_capacity(shape, dtype, data.len())?;
        Ok(Self {
            shape,
            dtype,
            data: &data[..required],
        })
    }

    pub fn shape(&self) -> &'a Shape {
        self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Typed read access, same rules as [`Tensor::data`].
    pub fn data<T: Element>(&self) -> Result<&'a [T], TensorError> {
        cast(self.dtype, self.data)
    }
}

fn check_capacity(shape: &Shape, dtype: DType, capacity: usize) -> Result<usize, TensorError> {
    let required = shape.size_bytes(dtype);
    if capacity < required {
        return Err(TensorError::BufferTooSmall {
            shape: shape.clone(),
            dtype,
            required,
            capacity,
        });
    }
    Ok(required)
}

fn cast<T: Element>(dtype: DType, bytes: &[u8]) -> Result<&[T], TensorError> {
    if T::DTYPE != dtype {
        return Err(TensorError::TypeMismatch {
            actual: dtype,
            requested: T::DTYPE,
        });
    }
    bytemuck::try_cast_slice(bytes).map_err(|_| TensorError::Misaligned {
        dtype,
        addr: bytes.as_ptr() as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use half::f16;

    #[test]
    fn test_zeros() {
        let t = Tensor::zeros(Shape::matrix(2, 3), DType::F32);
        assert_eq!(t.size_bytes(), 24);
        assert_eq!(t.size(), 6);
        assert!(t.is_owned());
        assert!(t.data::<f32>().unwrap().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_odd_byte_length_owned() {
        let t = Tensor::from_slice(Shape::vector(3), &[1u8, 2, 3]).unwrap();
        assert_eq!(t.as_bytes(), &[1, 2, 3]);
        assert_eq!(t.dtype(), DType::U8);
    }

    #[test]
    fn test_from_bytes_size_mismatch() {
        let result = Tensor::from_bytes(Shape::matrix(2, 3), DType::F32, &[0u8; 10]);
        assert_eq!(
            result.unwrap_err(),
            TensorError::BufferSizeMismatch {
                expected: 24,
                actual: 10
            }
        );
    }

    #[test]
    fn test_external_capacity_larger_is_accepted() {
        let buf = vec![7.0f32; 10];
        let t = Tensor::from_external_slice(Shape::vector(4), &buf).unwrap();
        assert_eq!(t.size_bytes(), 16);
        assert_eq!(t.data::<f32>().unwrap(), &[7.0; 4]);
    }

    #[test]
    fn test_external_capacity_too_small() {
        let buf = [0u8; 8];
        let err = Tensor::from_external(Shape::vector(4), DType::F32, &buf).unwrap_err();
        assert!(matches!(
            err,
            TensorError::BufferTooSmall {
                required: 16,
                capacity: 8,
                ..
            }
        ));
    }

    #[test]
    fn test_typed_access_rejects_wrong_type() {
        let t = Tensor::from_slice(Shape::vector(2), &[f16::ONE, f16::ZERO]).unwrap();
        assert_eq!(
            t.data::<f32>().unwrap_err(),
            TensorError::TypeMismatch {
                actual: DType::F16,
                requested: DType::F32
            }
        );
        assert_eq!(t.data::<f16>().unwrap()[0], f16::ONE);
    }

    #[test]
    fn test_misaligned_borrow() {
        let words = [0u64; 3];
        let bytes: &[u8] = bytemuck::cast_slice(&words);
        let t = Tensor::from_external(Shape::vector(2), DType::F32, &bytes[1..]).unwrap();
        assert!(matches!(
            t.data::<f32>(),
            Err(TensorError::Misaligned { .. })
        ));
    }

    #[test]
    fn test_read_only_external() {
        let buf = [1.0f32, 2.0];
        let mut t = Tensor::from_external_slice(Shape::vector(2), &buf).unwrap();
        assert!(!t.is_writable());
        assert_eq!(t.fill(0.0f32).unwrap_err(), TensorError::ReadOnly);
        assert!(t.as_bytes_mut().is_err());
    }

    #[test]
    fn test_mutable_external_writes_through() {
        let mut buf = vec![0.0f32; 4];
        {
            let mut t = Tensor::from_external_slice_mut(Shape::matrix(2, 2), &mut buf).unwrap();
            t.data_mut::<f32>().unwrap()[3] = 9.0;
        }
        assert_eq!(buf[3], 9.0);
    }

    #[test]
    fn test_detach_copies() {
        let mut buf = vec![1.0f32, 2.0];
        let owned = {
            let t = Tensor::from_external_slice_mut(Shape::vector(2), &mut buf).unwrap();
            t.detach()
        };
        buf[0] = 5.0;
        assert!(owned.is_owned());
        assert_eq!(owned.data::<f32>().unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_copy_from_checks_shape() {
        let src = Tensor::from_f32(Shape::vector(3), &[1.0, 2.0, 3.0]).unwrap();
        let mut dst = Tensor::zeros(Shape::vector(3), DType::F32);
        dst.copy_from(&src.view()).unwrap();
        assert_eq!(dst.data::<f32>().unwrap(), &[1.0, 2.0, 3.0]);

        let mut wrong = Tensor::zeros(Shape::vector(4), DType::F32);
        assert!(matches!(
            wrong.copy_from(&src.view()),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_clone_keeps_read_only_borrow() {
        let buf = [3i32, 4];
        let t = Tensor::from_external_slice(Shape::vector(2), &buf).unwrap();
        let c = t.clone();
        assert!(!c.is_owned());
        assert_eq!(c.data::<i32>().unwrap(), &[3, 4]);
        assert_eq!(format!("{c:?}"), "Tensor { shape: Shape { dims: [2] }, dtype: I32, storage: \"borrowed\" }");
    }

    #[test]
    fn test_view_from_parts() {
        let shape = Shape::vector(2);
        let words = [0u64; 1];
        let v = TensorView::from_parts(&shape, DType::F32, bytemuck::cast_slice(&words)).unwrap();
        assert_eq!(v.data::<f32>().unwrap(), &[0.0, 0.0]);
        assert!(TensorView::from_parts(&shape, DType::I64, bytemuck::cast_slice(&words)).is_err());
    }
}
