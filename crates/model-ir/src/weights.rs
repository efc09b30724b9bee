// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Weight storage decoded from SafeTensors containers.

use std::collections::BTreeMap;
use std::path::Path;

use tensor_core::{DType, Shape, Tensor};

use crate::ModelError;

/// Named weight tensors, owned and aligned.
///
/// Tensors are copied out of the container so the store does not keep the
/// file mapped and every tensor is aligned for typed access.
#[derive(Debug, Clone, Default)]
pub struct WeightStore {
    tensors: BTreeMap<String, Tensor<'static>>,
}

impl WeightStore {
    /// Memory-maps a SafeTensors file and decodes it.
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let file = std::fs::File::open(path)?;
        // SAFETY: the mapping is read-only and dropped before this function
        // returns; every tensor is copied out while it is alive.
        let mmap = unsafe { memmap2::Mmap::map(&file) }
            .map_err(|e| ModelError::SafeTensorsError(format!("mmap failed: {e}")))?;
        let store = Self::from_bytes(&mmap)?;
        tracing::debug!(
            path = %path.display(),
            tensors = store.len(),
            bytes = store.total_bytes(),
            "loaded weights"
        );
        Ok(store)
    }

    /// Decodes a SafeTensors container held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let container = safetensors::SafeTensors::deserialize(bytes)
            .map_err(|e| ModelError::SafeTensorsError(format!("parse error: {e}")))?;
        let mut tensors = BTreeMap::new();
        for (name, view) in container.tensors() {
            let dtype = convert_safetensor_dtype(view.dtype())?;
            let tensor = Tensor::from_bytes(Shape::new(view.shape().to_vec()), dtype, view.data())
                .map_err(|e| ModelError::SafeTensorsError(format!("tensor '{name}': {e}")))?;
            tensors.insert(name, tensor);
        }
        Ok(Self { tensors })
    }

    /// Builds a store from tensors already in memory.
    pub fn from_tensors<I>(tensors: I) -> Self
    where
        I: IntoIterator<Item = (String, Tensor<'static>)>,
    {
        Self {
            tensors: tensors.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tensor<'static>> {
        self.tensors.get(name)
    }

    /// Like [`get`](Self::get) but reports a missing tensor as an error.
    pub fn require(&self, name: &str) -> Result<&Tensor<'static>, ModelError> {
        self.get(name).ok_or_else(|| ModelError::WeightNotFound {
            name: name.to_string(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.tensors.values().map(|t| t.size_bytes()).sum()
    }
}

fn convert_safetensor_dtype(st_dtype: safetensors::Dtype) -> Result<DType, ModelError> {
    match st_dtype {
        safetensors::Dtype::F32 => Ok(DType::F32),
        safetensors::Dtype::F16 => Ok(DType::F16),
        safetensors::Dtype::BF16 => Ok(DType::BF16),
        safetensors::Dtype::I8 => Ok(DType::I8),
        safetensors::Dtype::U8 => Ok(DType::U8),
        safetensors::Dtype::I32 => Ok(DType::I32),
        safetensors::Dtype::I64 => Ok(DType::I64),
        other => Err(ModelError::UnsupportedDType(format!("{other:?}"))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use safetensors::tensor::TensorView;

    /// Serialises f32 tensors into a SafeTensors container.
    pub(crate) fn container(entries: &[(&str, Vec<usize>, Vec<f32>)]) -> Vec<u8> {
        let bytes: Vec<(String, Vec<usize>, Vec<u8>)> = entries
            .iter()
            .map(|(name, shape, values)| {
                let raw = values.iter().flat_map(|v| v.to_le_bytes()).collect();
                (name.to_string(), shape.clone(), raw)
            })
            .collect();
        let views: Vec<(String, TensorView<'_>)> = bytes
            .iter()
            .map(|(name, shape, raw)| {
                let view = TensorView::new(safetensors::Dtype::F32, shape.clone(), raw)
                    .expect("fixture view");
                (name.clone(), view)
            })
            .collect();
        safetensors::serialize(views, &None).expect("fixture serialise")
    }

    #[test]
    fn test_decode_container() {
        let bytes = container(&[
            ("fc.weight", vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]),
            ("fc.bias", vec![2], vec![0.5, -0.5]),
        ]);
        let store = WeightStore::from_bytes(&bytes).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_bytes(), 24);
        let w = store.require("fc.weight").unwrap();
        assert_eq!(w.shape(), &Shape::matrix(2, 2));
        assert_eq!(w.data::<f32>().unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["fc.bias", "fc.weight"]);
    }

    #[test]
    fn test_missing_tensor() {
        let store = WeightStore::default();
        assert!(matches!(
            store.require("nope"),
            Err(ModelError::WeightNotFound { .. })
        ));
    }

    #[test]
    fn test_garbage_bytes() {
        assert!(matches!(
            WeightStore::from_bytes(b"not a container"),
            Err(ModelError::SafeTensorsError(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.bin");
        std::fs::write(&path, container(&[("x", vec![3], vec![1.0, 2.0, 3.0])])).unwrap();
        let store = WeightStore::from_file(&path).unwrap();
        assert_eq!(store.get("x").unwrap().size(), 3);
    }
}
