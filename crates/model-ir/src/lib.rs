// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-ir
//!
//! In-memory representation of an inference graph and the loader that
//! produces it.
//!
//! - [`ModelManifest`]: the JSON graph description.
//! - [`LayerType`], [`LayerDef`], [`PortDef`]: resolved layers and ports.
//! - [`ModelGraph`]: ports plus ordered layers, with a **type-state pattern**
//!   (`Loaded` → `Validated`) guaranteeing shapes were checked.
//! - [`WeightStore`]: named weight tensors from a SafeTensors container.
//! - [`ModelLoader`]: description + weights path resolution.
//!
//! # Example
//! ```no_run
//! use model_ir::ModelLoader;
//! use std::path::Path;
//!
//! let model = ModelLoader::load(Path::new("models/net.xml"), None).unwrap();
//! println!("{}", model.graph.summary());
//! for layer in model.graph.iter_layers() {
//!     println!("  {}", layer.summary());
//! }
//! ```

mod error;
pub mod graph;
mod layer;
mod loader;
mod manifest;
mod weights;

pub use error::ModelError;
pub use graph::{ModelGraph, DEFAULT_EPS};
pub use layer::{LayerDef, LayerType, PortDef};
pub use loader::{LoadedModel, ModelLoader};
pub use manifest::{ManifestLayer, ManifestPort, ModelManifest};
pub use weights::WeightStore;
