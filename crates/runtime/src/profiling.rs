// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-run profiling data.
//!
//! Every completed run yields a [`ProfilingReport`] with its wall-clock time.
//! Per-layer entries are only recorded when the compiled model was built
//! with `ENABLE_PROFILING`.

use std::time::Duration;

/// Timing for one executed layer.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct LayerProfile {
    pub layer_name: String,
    /// Layer type label, e.g. `"linear"`.
    pub layer_type: String,
    pub compute_duration: Duration,
    /// Bytes written to the layer's output activation.
    pub output_bytes: usize,
}

/// Aggregate data for one inference run.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ProfilingReport {
    /// Wall-clock time from submission to the last layer finishing.
    pub total_duration: Duration,
    /// Sum of per-layer compute time.
    pub total_compute_duration: Duration,
    /// Largest single activation written during the run.
    pub peak_activation_bytes: usize,
    pub layers: Vec<LayerProfile>,
}

impl ProfilingReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a single layer's timing.
    pub fn record_layer(
        &mut self,
        name: &str,
        layer_type: &str,
        compute: Duration,
        output_bytes: usize,
    ) {
        self.total_compute_duration += compute;
        self.peak_activation_bytes = self.peak_activation_bytes.max(output_bytes);
        self.layers.push(LayerProfile {
            layer_name: name.to_string(),
            layer_type: layer_type.to_string(),
            compute_duration: compute,
            output_bytes,
        });
    }

    pub fn finalise(&mut self, total: Duration) {
        self.total_duration = total;
    }

    /// The layer with the longest compute time, if any were recorded.
    pub fn slowest_layer(&self) -> Option<&LayerProfile> {
        self.layers.iter().max_by_key(|l| l.compute_duration)
    }

    /// Returns a one-line human-readable summary.
    pub fn summary(&self) -> String {
        let mut s = format!(
            "Run: {:.3}ms total, {} layers profiled, {:.3}ms compute, peak activation {:.2} KB",
            self.total_duration.as_secs_f64() * 1000.0,
            self.layers.len(),
            self.total_compute_duration.as_secs_f64() * 1000.0,
            self.peak_activation_bytes as f64 / 1024.0,
        );
        if let Some(slowest) = self.slowest_layer() {
            s.push_str(&format!(
                ", slowest '{}' ({:.3}ms)",
                slowest.layer_name,
                slowest.compute_duration.as_secs_f64() * 1000.0
            ));
        }
        s
    }
}
