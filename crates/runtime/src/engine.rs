// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The engine: device registry and entry point of the pipeline.
//!
//! ```text
//! Engine
//!   │  .read_model()
//!   ▼
//! Model
//!   │  engine.compile_model(&model, "CPU")
//!   ▼
//! CompiledModel<'m>            borrows the Model
//!   │  .create_infer_request()
//!   ▼
//! InferRequest<'c>             borrows the CompiledModel
//! ```
//!
//! Each stage borrows the one before it, so releasing a model while a
//! compiled model still uses it does not compile.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use model_ir::ModelLoader;

use crate::compiled::CompiledModel;
use crate::config::EngineConfig;
use crate::handle::{HandleKind, HandleStats, HandleTable};
use crate::model::Model;
use crate::plugin::{self, Device};
use crate::property::{PropertyMap, PropertyValue};
use crate::RuntimeError;

// ── Device registry ────────────────────────────────────────────

struct DeviceEntry {
    device: Arc<dyn Device>,
    live: Arc<AtomicUsize>,
}

/// Counts one compiled model against its device for as long as it lives.
#[derive(Debug)]
pub(crate) struct DeviceLease {
    live: Arc<AtomicUsize>,
}

impl DeviceLease {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::AcqRel);
        Self {
            live: Arc::clone(live),
        }
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Handle counts per kind, as reported by [`Engine::handle_stats`].
pub type HandleReport = BTreeMap<HandleKind, HandleStats>;

// ── Engine ─────────────────────────────────────────────────────

/// Registry of devices and factory for models.
///
/// Each engine keeps its own device set; devices are not shared between
/// engines. One engine per process is the expected usage.
///
/// # Example
/// ```no_run
/// use infer_runtime::Engine;
///
/// # fn example() -> Result<(), infer_runtime::RuntimeError> {
/// let engine = Engine::new()?;
/// let model = engine.read_model("models/net.xml", None)?;
/// let compiled = engine.compile_model(&model, "CPU")?;
/// let mut request = compiled.create_infer_request()?;
/// request.infer()?;
/// println!("{:?}", request.get_output_tensor()?.shape());
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    devices: RwLock<BTreeMap<String, DeviceEntry>>,
    handles: Arc<HandleTable>,
}

impl Engine {
    /// Creates an engine with the default device set (`CPU`).
    pub fn new() -> Result<Self, RuntimeError> {
        Self::from_config(&EngineConfig::default())
    }

    /// Creates an engine with the devices listed in a TOML file.
    pub fn with_config(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        Self::from_config(&EngineConfig::from_file(path.as_ref())?)
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, RuntimeError> {
        let engine = Self::without_devices()?;
        engine.apply_config(config)?;
        tracing::info!(devices = ?engine.available_devices(), "Engine created");
        Ok(engine)
    }

    /// Creates an engine with an empty device registry.
    pub fn without_devices() -> Result<Self, RuntimeError> {
        plugin::init()?;
        Ok(Self {
            devices: RwLock::new(BTreeMap::new()),
            handles: Arc::new(HandleTable::new()),
        })
    }

    // ── Models ─────────────────────────────────────────────────

    /// Reads a model description, with weights from `weights` or the
    /// `<stem>.bin` sibling when present.
    ///
    /// # Errors
    /// [`RuntimeError::ModelLoad`] on a missing or malformed description, or
    /// an explicit weights path that does not exist.
    pub fn read_model(
        &self,
        path: impl AsRef<Path>,
        weights: Option<&Path>,
    ) -> Result<Model, RuntimeError> {
        let loaded = ModelLoader::load(path.as_ref(), weights)?;
        Ok(Model::new(&self.handles, loaded))
    }

    /// Reads a model from a description and optional SafeTensors bytes.
    pub fn read_model_from_memory(
        &self,
        description: &[u8],
        weights: Option<&[u8]>,
    ) -> Result<Model, RuntimeError> {
        let loaded = ModelLoader::from_memory(description, weights)?;
        Ok(Model::new(&self.handles, loaded))
    }

    // ── Compilation ────────────────────────────────────────────

    /// Compiles `model` for `device` with the device's current properties.
    pub fn compile_model<'m>(
        &self,
        model: &'m Model,
        device: &str,
    ) -> Result<CompiledModel<'m>, RuntimeError> {
        self.compile_model_with_config(model, device, &PropertyMap::new())
    }

    /// Compiles `model` for `device`, with `config` taking precedence over
    /// the device properties.
    ///
    /// `model` may have been read by another engine; it stays registered
    /// there, while the compiled model and its requests belong to this one.
    ///
    /// Whether `config` is also kept as the device's configuration is
    /// device-defined; the reference CPU device keeps it.
    ///
    /// # Errors
    /// - [`RuntimeError::DeviceNotFound`] if `device` is not registered.
    /// - [`RuntimeError::UnsupportedConfig`] for an unknown key or bad value.
    /// - [`RuntimeError::Compilation`] if the device cannot run the graph.
    pub fn compile_model_with_config<'m>(
        &self,
        model: &'m Model,
        device: &str,
        config: &PropertyMap,
    ) -> Result<CompiledModel<'m>, RuntimeError> {
        let (target, lease) = {
            let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
            let entry = devices.get(device).ok_or_else(|| not_found(device))?;
            (Arc::clone(&entry.device), DeviceLease::new(&entry.live))
        };
        let network = target.compile(model.graph(), model.weights(), config)?;
        Ok(CompiledModel::new(
            &self.handles,
            model,
            device,
            config.clone(),
            network,
            lease,
        ))
    }

    // ── Properties ─────────────────────────────────────────────

    pub fn get_property(&self, device: &str, key: &str) -> Result<PropertyValue, RuntimeError> {
        self.device(device)?.get_property(key)
    }

    /// Writes device properties. Applies all of them or none.
    ///
    /// Models already compiled for the device keep the properties they were
    /// compiled with.
    pub fn set_property(&self, device: &str, properties: &PropertyMap) -> Result<(), RuntimeError> {
        self.device(device)?.set_properties(properties)
    }

    // ── Registry ───────────────────────────────────────────────

    /// Instantiates plugin `plugin_id` as device `device_name`.
    ///
    /// # Errors
    /// [`RuntimeError::Plugin`] for an unknown plugin id or a device name
    /// that is already taken.
    pub fn register_plugin(&self, plugin_id: &str, device_name: &str) -> Result<(), RuntimeError> {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        if devices.contains_key(device_name) {
            return Err(RuntimeError::Plugin {
                plugin: plugin_id.to_string(),
                detail: format!("device '{device_name}' is already registered"),
            });
        }
        let device = plugin::init()?.instantiate(plugin_id, device_name)?;
        devices.insert(
            device_name.to_string(),
            DeviceEntry {
                device,
                live: Arc::new(AtomicUsize::new(0)),
            },
        );
        tracing::info!(plugin = plugin_id, device = device_name, "Device registered");
        Ok(())
    }

    /// Registers every device listed in a TOML engine configuration.
    pub fn register_plugins_from_config(&self, path: impl AsRef<Path>) -> Result<(), RuntimeError> {
        self.apply_config(&EngineConfig::from_file(path.as_ref())?)
    }

    fn apply_config(&self, config: &EngineConfig) -> Result<(), RuntimeError> {
        config.validate()?;
        for entry in &config.plugins {
            self.register_plugin(&entry.plugin, &entry.device)?;
            let properties = entry.property_map();
            if !properties.is_empty() {
                self.set_property(&entry.device, &properties)?;
            }
        }
        Ok(())
    }

    /// Removes a device from the registry.
    ///
    /// # Errors
    /// [`RuntimeError::DeviceBusy`] while compiled models for the device are
    /// alive; the device stays registered.
    pub fn unregister_plugin(&self, device_name: &str) -> Result<(), RuntimeError> {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);
        let entry = devices.get(device_name).ok_or_else(|| not_found(device_name))?;
        let live = entry.live.load(Ordering::Acquire);
        if live > 0 {
            return Err(RuntimeError::DeviceBusy {
                device: device_name.to_string(),
                live,
            });
        }
        devices.remove(device_name);
        tracing::info!(device = device_name, "Device unregistered");
        Ok(())
    }

    /// Registered device names, sorted.
    pub fn available_devices(&self) -> Vec<String> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Created/released counts for every handle kind this engine issued.
    pub fn handle_stats(&self) -> HandleReport {
        [
            HandleKind::Model,
            HandleKind::CompiledModel,
            HandleKind::InferRequest,
        ]
        .into_iter()
        .map(|kind| (kind, self.handles.stats(kind)))
        .collect()
    }

    fn device(&self, name: &str) -> Result<Arc<dyn Device>, RuntimeError> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|entry| Arc::clone(&entry.device))
            .ok_or_else(|| not_found(name))
    }
}

fn not_found(device: &str) -> RuntimeError {
    RuntimeError::DeviceNotFound {
        device: device.to_string(),
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("devices", &self.available_devices())
            .field("live_handles", &self.handles.live_count())
            .finish()
    }
}
