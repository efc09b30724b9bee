// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for synchronous and batched asynchronous inference.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use infer_runtime::{keys, properties, Engine, Shape, Tensor};
use safetensors::tensor::TensorView;

const CLASSES: usize = 1000;

const NET: &str = r#"{
    "name": "bench_net",
    "inputs": [{ "name": "data", "shape": [1, 3, 224, 224], "layout": "NCHW" }],
    "outputs": [{ "name": "prob", "shape": [1, 1000] }],
    "layers": [
        { "name": "pool", "layer_type": "global_avg_pool" },
        { "name": "fc", "layer_type": "linear", "weights": ["fc.weight", "fc.bias"] },
        { "name": "prob", "layer_type": "softmax" }
    ]
}"#;

fn weights() -> Vec<u8> {
    let w: Vec<u8> = (0..3 * CLASSES)
        .flat_map(|i| ((i % 11) as f32 * 0.05).to_le_bytes())
        .collect();
    let b: Vec<u8> = (0..CLASSES).flat_map(|_| 0.0f32.to_le_bytes()).collect();
    let views = vec![
        (
            "fc.weight",
            TensorView::new(safetensors::Dtype::F32, vec![3, CLASSES], &w).unwrap(),
        ),
        (
            "fc.bias",
            TensorView::new(safetensors::Dtype::F32, vec![CLASSES], &b).unwrap(),
        ),
    ];
    safetensors::serialize(views, &None).unwrap()
}

fn bench_sync_infer(c: &mut Criterion) {
    let engine = Engine::new().unwrap();
    let model = engine
        .read_model_from_memory(NET.as_bytes(), Some(&weights()))
        .unwrap();
    let compiled = engine.compile_model(&model, "CPU").unwrap();
    let pixels = vec![0.5f32; 3 * 224 * 224];
    let mut request = compiled.create_infer_request().unwrap();
    request
        .set_input_tensor(
            "data",
            Tensor::from_external_slice(Shape::from([1, 3, 224, 224]), &pixels).unwrap(),
        )
        .unwrap();

    c.bench_function("sync_infer", |b| b.iter(|| request.infer().unwrap()));
}

fn bench_async_batch(c: &mut Criterion) {
    let engine = Engine::new().unwrap();
    let model = engine
        .read_model_from_memory(NET.as_bytes(), Some(&weights()))
        .unwrap();

    let mut group = c.benchmark_group("async_batch");
    for streams in [1usize, 2, 4] {
        let compiled = engine
            .compile_model_with_config(
                &model,
                "CPU",
                &properties([(keys::NUM_STREAMS, streams.to_string())]),
            )
            .unwrap();
        let mut requests: Vec<_> = (0..streams)
            .map(|_| compiled.create_infer_request().unwrap())
            .collect();
        group.throughput(Throughput::Elements(streams as u64));
        group.bench_with_input(BenchmarkId::from_parameter(streams), &streams, |b, _| {
            b.iter(|| {
                for request in requests.iter_mut() {
                    request.start_async().unwrap();
                }
                for request in requests.iter_mut() {
                    request.wait().unwrap();
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sync_infer, bench_async_batch);
criterion_main!(benches);
