// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The reference CPU device (`reference_cpu`).
//!
//! Compiling merges the compile config into the device configuration and
//! keeps the result as the new device configuration, so
//! `OPTIMAL_NUMBER_OF_REQUESTS` read from the device reflects the last
//! compilation. Each compiled model works on a snapshot: later
//! `set_property` calls only affect models compiled afterwards.
//! Each compiled model owns:
//! - the lowered program (with its own copy of the weights),
//! - a [`MemoryPool`] bounded by `DEVICE_MEMORY_BUDGET`, from which every
//!   request reserves one buffer per activation,
//! - an [`Executor`] whose blocking pool runs asynchronous requests.

mod config;
mod executor;
mod program;

pub use config::{CpuConfig, PerformanceHint, Streams};

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use memory_manager::{BufferGuard, MemoryPool};
use model_ir::graph::Validated;
use model_ir::{ModelGraph, WeightStore};

use crate::plugin::{
    CompiledNetwork, CompletionCallback, Device, ExecutionOutput, PendingExecution,
    RequestContext, TensorMap, REFERENCE_CPU,
};
use crate::property::{keys, PropertyInfo, PropertyMap, PropertyValue};
use crate::RuntimeError;

use config::PROPERTIES;
use executor::Executor;
use program::CpuProgram;

/// A CPU device running the reference f32 kernels.
#[derive(Debug)]
pub struct CpuDevice {
    name: String,
    config: RwLock<CpuConfig>,
}

impl CpuDevice {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            config: RwLock::new(CpuConfig::default()),
        }
    }

    /// Snapshot of the current device configuration.
    pub fn config(&self) -> CpuConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Device for CpuDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn plugin_id(&self) -> &str {
        REFERENCE_CPU
    }

    fn get_property(&self, key: &str) -> Result<PropertyValue, RuntimeError> {
        self.config().get(&self.name, key)
    }

    fn set_properties(&self, properties: &PropertyMap) -> Result<(), RuntimeError> {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let next = config.merged(&self.name, properties)?;
        *config = next;
        tracing::info!(device = %self.name, ?properties, "Device properties updated");
        Ok(())
    }

    fn supported_properties(&self) -> Vec<PropertyInfo> {
        PROPERTIES.to_vec()
    }

    fn compile(
        &self,
        graph: &ModelGraph<Validated>,
        weights: Option<&WeightStore>,
        overrides: &PropertyMap,
    ) -> Result<Box<dyn CompiledNetwork>, RuntimeError> {
        let config = self.config().merged(&self.name, overrides)?;
        let program = CpuProgram::compile(&self.name, graph, weights)?;
        let executor = Executor::new(&self.name, config.optimal_requests())?;
        let pool = MemoryPool::new(config.memory_budget);

        if !overrides.is_empty() {
            let mut current = self.config.write().unwrap_or_else(PoisonError::into_inner);
            let next = current.merged(&self.name, overrides)?;
            *current = next;
        }

        tracing::info!(
            device = %self.name,
            model = %program.name(),
            steps = program.num_steps(),
            folded = program.folded_layers(),
            streams = executor.streams(),
            budget = %config.memory_budget,
            "Model compiled"
        );
        Ok(Box::new(CpuNetwork {
            device: self.name.clone(),
            config,
            program: Arc::new(program),
            pool,
            executor: Arc::new(executor),
        }))
    }
}

/// A model compiled for a [`CpuDevice`].
#[derive(Debug)]
struct CpuNetwork {
    device: String,
    config: CpuConfig,
    program: Arc<CpuProgram>,
    pool: MemoryPool,
    executor: Arc<Executor>,
}

impl CompiledNetwork for CpuNetwork {
    fn get_property(&self, key: &str) -> Result<PropertyValue, RuntimeError> {
        match key {
            keys::NETWORK_NAME => Ok(PropertyValue::from(self.program.name())),
            _ => self.config.get(&self.device, key),
        }
    }

    fn create_request(&self) -> Result<Box<dyn RequestContext>, RuntimeError> {
        let workspace = self
            .program
            .activation_sizes()
            .map(|size| self.pool.allocate(size))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| RuntimeError::ResourceExhausted {
                device: self.device.clone(),
                source,
            })?;
        tracing::debug!(
            device = %self.device,
            slots = workspace.len(),
            in_use = self.pool.in_use_bytes(),
            "Request workspace reserved"
        );
        Ok(Box::new(CpuRequest {
            device: self.device.clone(),
            program: Arc::clone(&self.program),
            executor: Arc::clone(&self.executor),
            workspace: Arc::new(Mutex::new(workspace)),
            profiling: self.config.profiling,
        }))
    }
}

/// Per-request state: the activation buffers, shared with the worker
/// while an asynchronous run is in flight.
struct CpuRequest {
    device: String,
    program: Arc<CpuProgram>,
    executor: Arc<Executor>,
    workspace: Arc<Mutex<Vec<BufferGuard>>>,
    profiling: bool,
}

impl RequestContext for CpuRequest {
    fn infer(&mut self, inputs: &TensorMap<'_>) -> Result<ExecutionOutput, RuntimeError> {
        let mut workspace = self.workspace.lock().unwrap_or_else(PoisonError::into_inner);
        self.program.execute(inputs, &mut workspace, self.profiling)
    }

    fn start(
        &mut self,
        inputs: TensorMap<'static>,
        on_complete: Option<CompletionCallback>,
    ) -> Result<PendingExecution, RuntimeError> {
        let (sender, pending) = PendingExecution::channel(on_complete);
        let program = Arc::clone(&self.program);
        let workspace = Arc::clone(&self.workspace);
        let profiling = self.profiling;
        self.executor.submit(move || {
            let result = {
                let mut workspace = workspace.lock().unwrap_or_else(PoisonError::into_inner);
                program.execute(&inputs, &mut workspace, profiling)
            };
            sender.complete(result);
        });
        tracing::debug!(device = %self.device, "Run submitted");
        Ok(pending)
    }
}
