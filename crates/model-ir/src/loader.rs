// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model loading from storage or memory.
//!
//! A model on disk is a JSON graph description plus an optional SafeTensors
//! weights file. The description is recognised by its content, not its name,
//! so `net.json` and `net.xml` load alike. When no weights path is given the
//! loader looks for a sibling with the same stem (`net.bin`, then
//! `net.safetensors`) and falls back to a topology-only model if there is none.

use std::path::{Path, PathBuf};

use crate::graph::Validated;
use crate::{ModelError, ModelGraph, ModelManifest, WeightStore};

/// Sibling weight file extensions, tried in order.
const WEIGHT_EXTENSIONS: &[&str] = &["bin", "safetensors"];

/// Name given to models that declare none and have no file stem.
const DEFAULT_MODEL_NAME: &str = "model";

/// A validated graph together with its weights, if any.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub graph: ModelGraph<Validated>,
    pub weights: Option<WeightStore>,
    /// Description file the model was read from; `None` for in-memory models.
    pub source: Option<PathBuf>,
}

pub struct ModelLoader;

impl ModelLoader {
    /// Reads a model from `path`, with weights from `weights` or a sibling file.
    ///
    /// An empty `weights` path is treated as absent.
    ///
    /// # Errors
    /// - [`ModelError::ModelNotFound`] if the description does not exist.
    /// - [`ModelError::UnsupportedFormat`] if `path` names a weights container.
    /// - [`ModelError::WeightsNotFound`] if an explicit weights path does not exist.
    /// - Parse, weight and graph errors from the description itself.
    pub fn load(path: &Path, weights: Option<&Path>) -> Result<LoadedModel, ModelError> {
        if !path.is_file() {
            return Err(ModelError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }
        let is_weights = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| WEIGHT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_weights {
            return Err(ModelError::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        }

        let manifest = ModelManifest::from_file(path)?;
        let weights_path = match weights.filter(|w| !w.as_os_str().is_empty()) {
            Some(explicit) if explicit.is_file() => Some(explicit.to_path_buf()),
            Some(explicit) => {
                return Err(ModelError::WeightsNotFound {
                    path: explicit.to_path_buf(),
                })
            }
            None => Self::sibling_weights(path),
        };
        let store = match &weights_path {
            Some(p) => Some(WeightStore::from_file(p)?),
            None => {
                tracing::warn!(
                    model = %path.display(),
                    "no weights file found, loading topology only"
                );
                None
            }
        };

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(DEFAULT_MODEL_NAME);
        let graph = ModelGraph::from_manifest(&manifest, stem, store.as_ref())?.validate()?;
        tracing::info!(
            model = %graph.name,
            layers = graph.num_layers(),
            weights = ?weights_path,
            "model loaded"
        );
        Ok(LoadedModel {
            graph,
            weights: store,
            source: Some(path.to_path_buf()),
        })
    }

    /// Builds a model from an in-memory description and optional SafeTensors bytes.
    pub fn from_memory(description: &[u8], weights: Option<&[u8]>) -> Result<LoadedModel, ModelError> {
        let manifest = ModelManifest::from_slice(description)?;
        let store = weights.map(WeightStore::from_bytes).transpose()?;
        let graph =
            ModelGraph::from_manifest(&manifest, DEFAULT_MODEL_NAME, store.as_ref())?.validate()?;
        Ok(LoadedModel {
            graph,
            weights: store,
            source: None,
        })
    }

    /// First existing `<stem>.<ext>` next to `path`.
    fn sibling_weights(path: &Path) -> Option<PathBuf> {
        WEIGHT_EXTENSIONS
            .iter()
            .map(|ext| path.with_extension(ext))
            .find(|candidate| candidate.is_file())
    }
}
