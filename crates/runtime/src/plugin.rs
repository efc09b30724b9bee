// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The device seam and the process-wide plugin catalog.
//!
//! A plugin is a factory that builds a [`Device`]. Devices compile graphs
//! into [`CompiledNetwork`]s, which hand out one [`RequestContext`] per
//! infer request. Everything behind these traits is opaque to the engine.

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::Duration;

use model_ir::graph::Validated;
use model_ir::{ModelGraph, WeightStore};
use tensor_core::Tensor;

use crate::device::CpuDevice;
use crate::profiling::ProfilingReport;
use crate::property::{PropertyInfo, PropertyMap, PropertyValue};
use crate::RuntimeError;

/// Named tensors handed to or produced by a device.
pub type TensorMap<'a> = BTreeMap<String, Tensor<'a>>;

/// Invoked on the worker thread when an asynchronous run settles.
pub type CompletionCallback = Arc<dyn Fn(Result<(), &RuntimeError>) + Send + Sync>;

/// Builds a device instance for the given device name.
pub type DeviceFactory = Arc<dyn Fn(&str) -> Result<Arc<dyn Device>, RuntimeError> + Send + Sync>;

/// A named execution backend.
pub trait Device: Send + Sync {
    /// Name the device is registered under.
    fn name(&self) -> &str;

    /// Catalog id of the plugin that built it.
    fn plugin_id(&self) -> &str;

    fn get_property(&self, key: &str) -> Result<PropertyValue, RuntimeError>;

    /// Applies all properties or none.
    fn set_properties(&self, properties: &PropertyMap) -> Result<(), RuntimeError>;

    fn supported_properties(&self) -> Vec<PropertyInfo>;

    /// Specialises a graph for this device. `config` takes precedence over
    /// the device properties.
    fn compile(
        &self,
        graph: &ModelGraph<Validated>,
        weights: Option<&WeightStore>,
        config: &PropertyMap,
    ) -> Result<Box<dyn CompiledNetwork>, RuntimeError>;
}

/// A device-specialised graph. Shared read-only by all its requests.
pub trait CompiledNetwork: Send + Sync {
    fn get_property(&self, key: &str) -> Result<PropertyValue, RuntimeError>;

    /// Reserves the execution resources of one request.
    fn create_request(&self) -> Result<Box<dyn RequestContext>, RuntimeError>;
}

/// Device-side state of one infer request.
pub trait RequestContext: Send {
    /// Runs to completion on the calling thread.
    fn infer(&mut self, inputs: &TensorMap<'_>) -> Result<ExecutionOutput, RuntimeError>;

    /// Submits a run and returns without waiting for it.
    fn start(
        &mut self,
        inputs: TensorMap<'static>,
        on_complete: Option<CompletionCallback>,
    ) -> Result<PendingExecution, RuntimeError>;
}

/// What a finished run produces.
#[derive(Debug, Default)]
pub struct ExecutionOutput {
    pub outputs: TensorMap<'static>,
    pub report: ProfilingReport,
}

type Completion = Result<ExecutionOutput, RuntimeError>;

/// Receiving side of an asynchronous run.
#[derive(Debug)]
pub struct PendingExecution {
    rx: mpsc::Receiver<Completion>,
}

/// Publishing side of an asynchronous run. Consumed by [`complete`](Self::complete).
pub struct CompletionSender {
    tx: mpsc::SyncSender<Completion>,
    callback: Option<CompletionCallback>,
}

impl PendingExecution {
    /// Creates a connected sender/receiver pair.
    pub fn channel(callback: Option<CompletionCallback>) -> (CompletionSender, PendingExecution) {
        let (tx, rx) = mpsc::sync_channel(1);
        (CompletionSender { tx, callback }, PendingExecution { rx })
    }

    /// Blocks until the run settles.
    pub fn wait(&self) -> Completion {
        self.rx.recv().map_err(|_| abandoned())?
    }

    /// Blocks for at most `timeout`; `None` if the run is still going.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Completion> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => Some(Err(abandoned())),
        }
    }
}

impl CompletionSender {
    /// Runs the callback, then publishes the result.
    pub fn complete(self, result: Completion) {
        if let Some(callback) = &self.callback {
            callback(result.as_ref().map(|_| ()));
        }
        // The receiver is gone only if the request was leaked; nothing to notify.
        let _ = self.tx.send(result);
    }
}

fn abandoned() -> RuntimeError {
    RuntimeError::Inference {
        device: "worker".into(),
        detail: "run abandoned before completion".into(),
    }
}

// ── Catalog ────────────────────────────────────────────────────────────

/// Plugin id of the built-in reference CPU device.
pub const REFERENCE_CPU: &str = "reference_cpu";

/// Process-wide map from plugin id to device factory.
pub struct PluginCatalog {
    factories: RwLock<BTreeMap<String, DeviceFactory>>,
}

static CATALOG: OnceLock<PluginCatalog> = OnceLock::new();

/// Bootstraps the runtime: builds the plugin catalog with the built-in
/// plugins. Safe to call any number of times.
pub fn init() -> Result<&'static PluginCatalog, RuntimeError> {
    Ok(CATALOG.get_or_init(|| {
        let catalog = PluginCatalog {
            factories: RwLock::new(BTreeMap::new()),
        };
        let cpu: DeviceFactory = Arc::new(|name: &str| -> Result<Arc<dyn Device>, RuntimeError> {
            Ok(Arc::new(CpuDevice::new(name)))
        });
        let mut factories = catalog
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        factories.insert(REFERENCE_CPU.to_string(), Arc::clone(&cpu));
        factories.insert("cpu".to_string(), cpu);
        drop(factories);
        tracing::info!("Plugin catalog initialised");
        catalog
    }))
}

/// Adds a user plugin to the process-wide catalog.
///
/// # Errors
/// [`RuntimeError::Plugin`] if the id is already taken.
pub fn register_plugin_factory<F>(plugin_id: &str, factory: F) -> Result<(), RuntimeError>
where
    F: Fn(&str) -> Result<Arc<dyn Device>, RuntimeError> + Send + Sync + 'static,
{
    init()?.register(plugin_id, Arc::new(factory))
}

impl PluginCatalog {
    pub fn register(&self, plugin_id: &str, factory: DeviceFactory) -> Result<(), RuntimeError> {
        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if factories.contains_key(plugin_id) {
            return Err(RuntimeError::Plugin {
                plugin: plugin_id.to_string(),
                detail: "plugin id already registered".into(),
            });
        }
        factories.insert(plugin_id.to_string(), factory);
        tracing::info!(plugin = plugin_id, "Plugin factory registered");
        Ok(())
    }

    /// Builds a device named `device_name` from plugin `plugin_id`.
    pub fn instantiate(
        &self,
        plugin_id: &str,
        device_name: &str,
    ) -> Result<Arc<dyn Device>, RuntimeError> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(plugin_id)
            .cloned()
            .ok_or_else(|| RuntimeError::Plugin {
                plugin: plugin_id.to_string(),
                detail: "unknown plugin id".into(),
            })?;
        factory(device_name)
    }

    pub fn contains(&self, plugin_id: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(plugin_id)
    }

    pub fn plugin_ids(&self) -> Vec<String> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("plugins", &self.plugin_ids())
            .finish()
    }
}
