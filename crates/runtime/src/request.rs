// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Infer requests and their run protocol.
//!
//! ```text
//!            infer() / start_async()
//!   Idle ───────────────────────────▶ Running
//!    ▲                                  │ settles
//!    │                                  ▼
//!    └──── next run / rebind ──── Completed | Failed
//! ```
//!
//! A request has at most one run in flight. While it is `Running` it cannot
//! be rebound, resubmitted or read; `Completed` and `Failed` are settled
//! states from which the request can be reused.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use model_ir::PortDef;
use tensor_core::Tensor;

use crate::compiled::CompiledModel;
use crate::handle::{HandleId, ResourceHandle};
use crate::plugin::{CompletionCallback, ExecutionOutput, PendingExecution, RequestContext, TensorMap};
use crate::profiling::{LayerProfile, ProfilingReport};
use crate::RuntimeError;

/// Where a request is in its run protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestState::Idle => "idle",
            RequestState::Running => "running",
            RequestState::Completed => "completed",
            RequestState::Failed => "failed",
        })
    }
}

/// A reusable execution context bound to one [`CompiledModel`].
///
/// Tensors bound to its slots may borrow caller memory for `'a`. Runs
/// started with [`start_async`](Self::start_async) work on a snapshot of
/// the inputs, so the caller's buffers are never read after submission.
///
/// Calls on one request must not race; wrap it in a lock to share it.
/// Distinct requests of the same compiled model run concurrently.
///
/// Dropping a request that is still `Running` blocks until the run settles.
pub struct InferRequest<'a> {
    compiled: &'a CompiledModel<'a>,
    handle: ResourceHandle<Box<dyn RequestContext>>,
    state: RequestState,
    inputs: BTreeMap<String, Tensor<'a>>,
    outputs: BTreeMap<String, Tensor<'a>>,
    pending: Option<PendingExecution>,
    failure: Option<String>,
    callback: Option<CompletionCallback>,
    last_run: Option<ProfilingReport>,
}

impl<'a> InferRequest<'a> {
    pub(crate) fn new(
        compiled: &'a CompiledModel<'a>,
        handle: ResourceHandle<Box<dyn RequestContext>>,
    ) -> Self {
        let zeroed = |ports: &[PortDef]| {
            ports
                .iter()
                .map(|p| (p.name.clone(), Tensor::zeros(p.shape.clone(), p.dtype)))
                .collect()
        };
        Self {
            compiled,
            handle,
            state: RequestState::Idle,
            inputs: zeroed(compiled.inputs()),
            outputs: zeroed(compiled.outputs()),
            pending: None,
            failure: None,
            callback: None,
            last_run: None,
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn compiled_model(&self) -> &'a CompiledModel<'a> {
        self.compiled
    }

    pub fn handle_id(&self) -> HandleId {
        self.handle.id()
    }

    // ── Binding ────────────────────────────────────────────────

    /// Binds `tensor` to the input or output called `name`.
    pub fn set_tensor(&mut self, name: &str, tensor: Tensor<'a>) -> Result<(), RuntimeError> {
        self.ensure_settled()?;
        if self.inputs.contains_key(name) {
            self.set_input_tensor(name, tensor)
        } else if self.outputs.contains_key(name) {
            self.set_output_tensor(name, tensor)
        } else {
            Err(RuntimeError::PortNotFound {
                name: name.to_string(),
            })
        }
    }

    /// Binds an input slot, replacing the previous tensor.
    ///
    /// # Errors
    /// - [`RuntimeError::RequestBusy`] while a run is in flight.
    /// - [`RuntimeError::PortNotFound`] for an unknown input.
    /// - [`RuntimeError::TypeMismatch`] / [`RuntimeError::InvalidTensor`] if
    ///   the element type or shape differs from the port.
    pub fn set_input_tensor(&mut self, name: &str, tensor: Tensor<'a>) -> Result<(), RuntimeError> {
        self.ensure_settled()?;
        let compiled = self.compiled;
        let port = compiled.model().input(name)?;
        check_binding(port, &tensor)?;
        self.inputs.insert(name.to_string(), tensor);
        Ok(())
    }

    /// Binds an output slot; results of later runs are written into it.
    ///
    /// The tensor must be writable.
    pub fn set_output_tensor(&mut self, name: &str, tensor: Tensor<'a>) -> Result<(), RuntimeError> {
        self.ensure_settled()?;
        let compiled = self.compiled;
        let port = compiled.model().output(name)?;
        check_binding(port, &tensor)?;
        if !tensor.is_writable() {
            return Err(RuntimeError::InvalidTensor {
                port: name.to_string(),
                detail: "output tensors must wrap writable memory".into(),
            });
        }
        self.outputs.insert(name.to_string(), tensor);
        Ok(())
    }

    /// The tensor currently in slot `name`.
    pub fn get_tensor(&self, name: &str) -> Result<&Tensor<'a>, RuntimeError> {
        self.ensure_settled()?;
        self.inputs
            .get(name)
            .or_else(|| self.outputs.get(name))
            .ok_or_else(|| RuntimeError::PortNotFound {
                name: name.to_string(),
            })
    }

    /// Mutable access to slot `name`, e.g. to fill a pre-bound input.
    pub fn get_tensor_mut(&mut self, name: &str) -> Result<&mut Tensor<'a>, RuntimeError> {
        self.ensure_settled()?;
        let slot = if self.inputs.contains_key(name) {
            self.inputs.get_mut(name)
        } else {
            self.outputs.get_mut(name)
        };
        slot.ok_or_else(|| RuntimeError::PortNotFound {
            name: name.to_string(),
        })
    }

    /// The output tensor of a single-output model.
    ///
    /// # Errors
    /// [`RuntimeError::AmbiguousOutput`] if the model has several outputs.
    pub fn get_output_tensor(&self) -> Result<&Tensor<'a>, RuntimeError> {
        match self.compiled.outputs() {
            [only] => self.get_tensor(&only.name),
            ports => Err(RuntimeError::AmbiguousOutput { count: ports.len() }),
        }
    }

    /// Sets a function to call when an asynchronous run settles.
    ///
    /// It runs on a worker thread, before [`wait`](Self::wait) can observe
    /// the result.
    pub fn set_callback<F>(&mut self, callback: F) -> Result<(), RuntimeError>
    where
        F: Fn(Result<(), &RuntimeError>) + Send + Sync + 'static,
    {
        self.ensure_settled()?;
        self.callback = Some(Arc::new(callback));
        Ok(())
    }

    // ── Running ────────────────────────────────────────────────

    /// Runs on the calling thread until the device finishes.
    ///
    /// # Errors
    /// [`RuntimeError::RequestBusy`] if a run is in flight;
    /// [`RuntimeError::Inference`] if the device fails, leaving the request
    /// `Failed`.
    pub fn infer(&mut self) -> Result<(), RuntimeError> {
        self.ensure_settled()?;
        self.compiled.ensure_live()?;
        let context = self.handle.get_mut()?;
        self.state = RequestState::Running;
        self.failure = None;
        let result = context.infer(&self.inputs);
        self.settle(result)
    }

    /// Submits a run and returns immediately.
    pub fn start_async(&mut self) -> Result<(), RuntimeError> {
        self.ensure_settled()?;
        self.compiled.ensure_live()?;
        let snapshot: TensorMap<'static> = self
            .inputs
            .iter()
            .map(|(name, tensor)| (name.clone(), tensor.detach()))
            .collect();
        let callback = self.callback.clone();
        let pending = self.handle.get_mut()?.start(snapshot, callback)?;
        self.pending = Some(pending);
        self.state = RequestState::Running;
        self.failure = None;
        tracing::debug!(request = %self.handle.id(), "Run started");
        Ok(())
    }

    /// Blocks until the current run settles.
    ///
    /// Returns immediately if it already has: `Ok` after a success, the
    /// run's error after a failure.
    ///
    /// # Errors
    /// [`RuntimeError::NotRunning`] on a request that was never started.
    pub fn wait(&mut self) -> Result<(), RuntimeError> {
        match self.state {
            RequestState::Idle => Err(RuntimeError::NotRunning),
            RequestState::Completed => Ok(()),
            RequestState::Failed => Err(self.failure_error()),
            RequestState::Running => {
                let result = match &self.pending {
                    Some(pending) => pending.wait(),
                    None => Err(self.lost_run()),
                };
                self.settle(result)
            }
        }
    }

    /// Waits at most `timeout`; `Ok(false)` if the run is still going.
    ///
    /// A request that is still running stays `Running` and cannot be
    /// rebound or resubmitted.
    pub fn wait_for(&mut self, timeout: Duration) -> Result<bool, RuntimeError> {
        match self.state {
            RequestState::Idle => Err(RuntimeError::NotRunning),
            RequestState::Completed => Ok(true),
            RequestState::Failed => Err(self.failure_error()),
            RequestState::Running => {
                let polled = match &self.pending {
                    Some(pending) => pending.wait_timeout(timeout),
                    None => Some(Err(self.lost_run())),
                };
                match polled {
                    None => Ok(false),
                    Some(result) => self.settle(result).map(|()| true),
                }
            }
        }
    }

    // ── Profiling ──────────────────────────────────────────────

    /// Per-layer timings of the last completed run.
    ///
    /// Empty unless the model was compiled with `ENABLE_PROFILING`.
    pub fn profiling_info(&self) -> &[LayerProfile] {
        self.last_run
            .as_ref()
            .map(|report| report.layers.as_slice())
            .unwrap_or(&[])
    }

    /// Summary of the last completed run.
    pub fn last_run(&self) -> Option<&ProfilingReport> {
        self.last_run.as_ref()
    }

    /// Releases device resources now, after any in-flight run settles.
    pub fn release(mut self) -> Result<(), RuntimeError> {
        self.drain();
        self.handle.release()
    }

    // ── Internals ──────────────────────────────────────────────

    fn ensure_settled(&self) -> Result<(), RuntimeError> {
        match self.state {
            RequestState::Running => Err(RuntimeError::RequestBusy),
            _ => Ok(()),
        }
    }

    fn settle(&mut self, result: Result<ExecutionOutput, RuntimeError>) -> Result<(), RuntimeError> {
        self.pending = None;
        let outcome = result.and_then(|output| self.deliver(output));
        match outcome {
            Ok(()) => {
                self.state = RequestState::Completed;
                Ok(())
            }
            Err(e) => {
                let detail = match e {
                    RuntimeError::Inference { detail, .. } => detail,
                    other => other.to_string(),
                };
                tracing::warn!(request = %self.handle.id(), %detail, "Run failed");
                self.state = RequestState::Failed;
                self.failure = Some(detail);
                Err(self.failure_error())
            }
        }
    }

    /// Moves produced tensors into the output slots.
    fn deliver(&mut self, output: ExecutionOutput) -> Result<(), RuntimeError> {
        let ExecutionOutput { outputs, report } = output;
        for (name, produced) in outputs {
            let reusable = self.outputs.get(&name).is_some_and(|slot| {
                slot.is_writable()
                    && slot.dtype() == produced.dtype()
                    && slot.shape() == produced.shape()
            });
            if !reusable {
                self.outputs.insert(name, produced);
            } else if let Some(slot) = self.outputs.get_mut(&name) {
                slot.copy_from(&produced.view())?;
            }
        }
        self.last_run = Some(report);
        Ok(())
    }

    fn failure_error(&self) -> RuntimeError {
        RuntimeError::Inference {
            device: self.compiled.device().to_string(),
            detail: self
                .failure
                .clone()
                .unwrap_or_else(|| "unknown failure".into()),
        }
    }

    fn lost_run(&self) -> RuntimeError {
        RuntimeError::inference(self.compiled.device(), "no run in flight")
    }

    /// Waits out an in-flight run. Outputs are discarded; a failure is logged.
    fn drain(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!(request = %self.handle.id(), "Waiting for in-flight run before release");
            if let Err(e) = pending.wait() {
                tracing::warn!(request = %self.handle.id(), error = %e, "In-flight run failed during release");
            }
            self.state = RequestState::Idle;
        }
    }
}

fn check_binding(port: &PortDef, tensor: &Tensor<'_>) -> Result<(), RuntimeError> {
    if tensor.dtype() != port.dtype {
        return Err(RuntimeError::TypeMismatch {
            port: port.name.clone(),
            expected: port.dtype,
            actual: tensor.dtype(),
        });
    }
    if tensor.shape() != &port.shape {
        return Err(RuntimeError::InvalidTensor {
            port: port.name.clone(),
            detail: format!("expected shape {}, got {}", port.shape, tensor.shape()),
        });
    }
    Ok(())
}

impl Drop for InferRequest<'_> {
    fn drop(&mut self) {
        self.drain();
    }
}

impl fmt::Debug for InferRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferRequest")
            .field("model", &self.compiled.model().name())
            .field("device", &self.compiled.device())
            .field("state", &self.state)
            .field("handle", &self.handle)
            .finish()
    }
}
