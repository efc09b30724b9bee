// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shared fixtures: a small image classifier written to disk.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use safetensors::tensor::TensorView;

pub const CLASSES: usize = 1000;
pub const INPUT_SHAPE: [usize; 4] = [1, 3, 224, 224];

/// `data [1,3,224,224] → gap → identity → fc (3→1000) → softmax → prob [1,1000]`.
pub const NET_JSON: &str = r#"{
    "inputs": [{ "name": "data", "shape": [1, 3, 224, 224], "layout": "NCHW" }],
    "outputs": [{ "name": "prob", "shape": [1, 1000] }],
    "layers": [
        { "name": "pool", "layer_type": "global_avg_pool" },
        { "name": "pass", "layer_type": "identity" },
        { "name": "fc", "layer_type": "linear", "weights": ["fc.weight", "fc.bias"] },
        { "name": "prob", "layer_type": "softmax" }
    ]
}"#;

/// Two-output variant for the multi-output paths.
pub const TWO_HEADS_JSON: &str = r#"{
    "name": "two_heads",
    "inputs": [{ "name": "x", "shape": [2, 4] }],
    "outputs": [
        { "name": "act", "shape": [2, 4], "source": "act" },
        { "name": "norm", "shape": [2, 4], "source": "norm" }
    ],
    "layers": [
        { "name": "act", "layer_type": "relu" },
        { "name": "norm", "layer_type": "layer_norm", "weights": ["ln.gamma", "ln.beta"] }
    ]
}"#;

/// Serialises f32 tensors into a SafeTensors container.
pub fn container(entries: &[(&str, Vec<usize>, Vec<f32>)]) -> Vec<u8> {
    let raw: Vec<(String, Vec<usize>, Vec<u8>)> = entries
        .iter()
        .map(|(name, shape, values)| {
            let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            (name.to_string(), shape.clone(), bytes)
        })
        .collect();
    let views: Vec<(String, TensorView<'_>)> = raw
        .iter()
        .map(|(name, shape, bytes)| {
            let view = TensorView::new(safetensors::Dtype::F32, shape.clone(), bytes)
                .expect("fixture view");
            (name.clone(), view)
        })
        .collect();
    safetensors::serialize(views, &None).expect("fixture serialise")
}

/// Weights for [`NET_JSON`]: class `j` favours channel `j % 3`.
pub fn net_weights() -> Vec<u8> {
    let mut w = vec![0.0f32; 3 * CLASSES];
    for j in 0..CLASSES {
        w[(j % 3) * CLASSES + j] = 1.0 + (j % 5) as f32 * 0.1;
    }
    let bias: Vec<f32> = (0..CLASSES).map(|j| (j % 7) as f32 * 0.01).collect();
    container(&[
        ("fc.weight", vec![3, CLASSES], w),
        ("fc.bias", vec![CLASSES], bias),
    ])
}

pub fn two_heads_weights() -> Vec<u8> {
    container(&[
        ("ln.gamma", vec![4], vec![1.0; 4]),
        ("ln.beta", vec![4], vec![0.0; 4]),
    ])
}

/// Writes `net.xml` and `net.bin` into `dir`, returning the description path.
pub fn write_net(dir: &Path) -> PathBuf {
    let path = dir.join("net.xml");
    std::fs::write(&path, NET_JSON).expect("write description");
    std::fs::write(dir.join("net.bin"), net_weights()).expect("write weights");
    path
}

/// A deterministic image whose three channels average to 0.1, 0.5 and 0.9.
pub fn image() -> Vec<f32> {
    let plane = 224 * 224;
    (0..3 * plane)
        .map(|i| match i / plane {
            0 => 0.1,
            1 => 0.5,
            _ => 0.9,
        })
        .collect()
}
