// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device-specialised models.

use std::sync::Arc;

use model_ir::PortDef;

use crate::engine::DeviceLease;
use crate::handle::{HandleId, HandleKind, HandleTable, ResourceHandle};
use crate::model::Model;
use crate::plugin::CompiledNetwork;
use crate::property::{PropertyMap, PropertyValue};
use crate::request::InferRequest;
use crate::RuntimeError;

/// A [`Model`] compiled for one device and configuration.
///
/// Read-only after creation: any number of [`InferRequest`]s can be created
/// from it and run concurrently from different threads. Requests borrow the
/// compiled model, so it outlives all of them:
///
/// ```compile_fail
/// # fn f(compiled: infer_runtime::CompiledModel<'_>) {
/// let request = compiled.create_infer_request().unwrap();
/// compiled.release().unwrap(); // error: `compiled` is still borrowed
/// drop(request);
/// # }
/// ```
pub struct CompiledModel<'m> {
    model: &'m Model,
    device: String,
    config: PropertyMap,
    // Dropped before the lease so the device is counted until the network is gone.
    handle: ResourceHandle<Box<dyn CompiledNetwork>>,
    _lease: DeviceLease,
    table: Arc<HandleTable>,
}

impl<'m> CompiledModel<'m> {
    pub(crate) fn new(
        table: &Arc<HandleTable>,
        model: &'m Model,
        device: &str,
        config: PropertyMap,
        network: Box<dyn CompiledNetwork>,
        lease: DeviceLease,
    ) -> Self {
        Self {
            model,
            device: device.to_string(),
            config,
            handle: ResourceHandle::new(table, HandleKind::CompiledModel, network),
            _lease: lease,
            table: Arc::clone(table),
        }
    }

    /// Reserves device resources for a new request.
    ///
    /// Inputs start out as zero-filled tensors and outputs as tensors of
    /// the declared shapes, so a request can run right away.
    ///
    /// # Errors
    /// [`RuntimeError::ResourceExhausted`] when the device cannot back
    /// another request.
    pub fn create_infer_request(&self) -> Result<InferRequest<'_>, RuntimeError> {
        self.model.ensure_live()?;
        let context = self.network()?.create_request()?;
        let handle = ResourceHandle::new(&self.table, HandleKind::InferRequest, context);
        tracing::info!(
            model = %self.model.name(),
            device = %self.device,
            request = %handle.id(),
            "Infer request created"
        );
        Ok(InferRequest::new(self, handle))
    }

    /// Reads a property as this compiled model sees it.
    pub fn get_property(&self, key: &str) -> Result<PropertyValue, RuntimeError> {
        self.network()?.get_property(key)
    }

    /// The model this was compiled from.
    pub fn model(&self) -> &'m Model {
        self.model
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Compile-time properties passed by the caller.
    pub fn config(&self) -> &PropertyMap {
        &self.config
    }

    pub fn inputs(&self) -> &'m [PortDef] {
        self.model.inputs()
    }

    pub fn outputs(&self) -> &'m [PortDef] {
        self.model.outputs()
    }

    pub fn handle_id(&self) -> HandleId {
        self.handle.id()
    }

    pub(crate) fn network(&self) -> Result<&dyn CompiledNetwork, RuntimeError> {
        Ok(&**self.handle.get()?)
    }

    /// Checks that this compiled model and its model are still registered.
    pub(crate) fn ensure_live(&self) -> Result<(), RuntimeError> {
        self.model.ensure_live()?;
        self.handle.ensure_live()
    }

    /// Releases device resources now instead of at the end of scope.
    pub fn release(mut self) -> Result<(), RuntimeError> {
        self.handle.release()
    }
}

impl std::fmt::Debug for CompiledModel<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModel")
            .field("model", &self.model.name())
            .field("device", &self.device)
            .field("config", &self.config)
            .field("handle", &self.handle)
            .finish()
    }
}
