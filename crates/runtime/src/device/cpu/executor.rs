// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Worker runtime for asynchronous runs.
//!
//! Each compiled model owns one tokio runtime. Runs are CPU-bound, so they
//! go to the blocking pool, whose size is the model's stream count.

use tokio::runtime::{Builder, Runtime};

use crate::RuntimeError;

pub(crate) struct Executor {
    runtime: Option<Runtime>,
    streams: usize,
}

impl Executor {
    pub(crate) fn new(device: &str, streams: usize) -> Result<Self, RuntimeError> {
        let streams = streams.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(streams)
            .thread_name(format!("{}-stream", device.to_ascii_lowercase()))
            .build()
            .map_err(|e| RuntimeError::Compilation {
                device: device.to_string(),
                detail: format!("cannot start worker runtime: {e}"),
            })?;
        Ok(Self {
            runtime: Some(runtime),
            streams,
        })
    }

    pub(crate) fn streams(&self) -> usize {
        self.streams
    }

    /// Queues `job` on the blocking pool.
    pub(crate) fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = self
            .runtime
            .as_ref()
            .expect("runtime must exist until the executor is dropped");
        // Completion is reported through the job's own channel.
        drop(runtime.spawn_blocking(job));
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("streams", &self.streams)
            .finish()
    }
}
