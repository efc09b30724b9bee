// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: end-to-end pipeline.
//!
//! These tests exercise the complete flow from model files on disk →
//! read → compile → request → bind → infer, proving that the crates compose
//! and that every stage releases what it acquired.

mod common;

use std::path::Path;

use infer_runtime::{
    keys, properties, DType, Engine, HandleKind, HandleStats, RuntimeError, Shape, Tensor,
    TensorError,
};

use common::{image, write_net, CLASSES, INPUT_SHAPE};

// ── Pipeline ───────────────────────────────────────────────────

#[test]
fn test_classifier_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let xml = write_net(dir.path());
    let engine = Engine::new().unwrap();

    let model = engine
        .read_model(&xml, Some(dir.path().join("net.bin").as_path()))
        .unwrap();
    assert_eq!(model.name(), "net");
    assert_eq!(model.batch_size(), 1);
    assert_eq!(model.inputs()[0].shape, Shape::from(INPUT_SHAPE));
    assert_eq!(model.outputs()[0].shape, Shape::matrix(1, CLASSES));

    let compiled = engine.compile_model(&model, "CPU").unwrap();
    let pixels = image();
    let mut request = compiled.create_infer_request().unwrap();

    let input = Tensor::from_external_slice(Shape::from(INPUT_SHAPE), &pixels).unwrap();
    request.set_input_tensor("data", input).unwrap();
    request.infer().unwrap();

    let output = request.get_output_tensor().unwrap();
    assert_eq!(output.shape(), &Shape::matrix(1, CLASSES));
    assert_eq!(output.dtype(), DType::F32);
    let probs = output.data::<f32>().unwrap();
    assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-3);

    // Channel 2 is brightest, so the top class reads channel 2 with the largest weight.
    let top = probs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(top % 3, 2);
    assert_eq!(top % 5, 4);
}

#[test]
fn test_every_output_matches_declared_shape() {
    let engine = Engine::new().unwrap();
    let model = engine
        .read_model_from_memory(
            common::TWO_HEADS_JSON.as_bytes(),
            Some(&common::two_heads_weights()),
        )
        .unwrap();
    assert_eq!(model.name(), "two_heads");
    let compiled = engine.compile_model(&model, "CPU").unwrap();
    let mut request = compiled.create_infer_request().unwrap();
    request
        .set_input_tensor(
            "x",
            Tensor::from_f32(Shape::matrix(2, 4), &[-1.0, 0.0, 1.0, 2.0, 3.0, 3.0, 3.0, 3.0]).unwrap(),
        )
        .unwrap();
    request.infer().unwrap();

    for port in model.outputs() {
        assert_eq!(request.get_tensor(&port.name).unwrap().shape(), &port.shape);
    }
    let act = request.get_tensor("act").unwrap().data::<f32>().unwrap();
    assert_eq!(&act[..4], &[0.0, 0.0, 1.0, 2.0]);
    assert!(matches!(
        request.get_output_tensor(),
        Err(RuntimeError::AmbiguousOutput { count: 2 })
    ));
}

#[test]
fn test_caller_owned_output_receives_results() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new().unwrap();
    let model = engine.read_model(write_net(dir.path()), None).unwrap();
    let compiled = engine.compile_model(&model, "CPU").unwrap();

    let pixels = image();
    let mut scores = vec![0.0f32; CLASSES];
    {
        let mut request = compiled.create_infer_request().unwrap();
        request
            .set_input_tensor(
                "data",
                Tensor::from_external_slice(Shape::from(INPUT_SHAPE), &pixels).unwrap(),
            )
            .unwrap();
        request
            .set_output_tensor(
                "prob",
                Tensor::from_external_slice_mut(Shape::matrix(1, CLASSES), &mut scores).unwrap(),
            )
            .unwrap();
        request.infer().unwrap();
    }
    assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-3);
}

#[test]
fn test_inference_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new().unwrap();
    let model = engine.read_model(write_net(dir.path()), None).unwrap();
    let compiled = engine.compile_model(&model, "CPU").unwrap();
    let pixels = image();

    let run = || {
        let mut request = compiled.create_infer_request().unwrap();
        request
            .set_input_tensor(
                "data",
                Tensor::from_external_slice(Shape::from(INPUT_SHAPE), &pixels).unwrap(),
            )
            .unwrap();
        request.infer().unwrap();
        request.get_output_tensor().unwrap().detach()
    };
    assert_eq!(run().as_bytes(), run().as_bytes());
}

// ── Model reading ──────────────────────────────────────────────

#[test]
fn test_reading_twice_gives_independent_models() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_net(dir.path());
    let engine = Engine::new().unwrap();

    let a = engine.read_model(&path, None).unwrap();
    let b = engine.read_model(&path, None).unwrap();
    assert_eq!(a.name(), b.name());
    assert_eq!(a.inputs(), b.inputs());
    assert_eq!(a.outputs(), b.outputs());
    assert_ne!(a.handle_id(), b.handle_id());
    assert!(a.has_weights());
    assert_eq!(a.source(), Some(path.as_path()));
}

#[test]
fn test_model_read_by_another_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_net(dir.path());
    let reader = Engine::new().unwrap();
    let runner = Engine::new().unwrap();

    let foreign = reader.read_model(&path, None).unwrap();
    let compiled = runner.compile_model(&foreign, "CPU").unwrap();
    let pixels = image();
    {
        let mut request = compiled.create_infer_request().unwrap();
        request
            .set_input_tensor(
                "data",
                Tensor::from_external_slice(Shape::from(INPUT_SHAPE), &pixels).unwrap(),
            )
            .unwrap();
        request.infer().unwrap();
        assert_eq!(request.get_output_tensor().unwrap().size(), CLASSES);
    }

    // Ids are per engine; a model of the runner sharing the id must not matter.
    let own = runner.read_model(&path, None).unwrap();
    assert_eq!(own.handle_id(), foreign.handle_id());
    own.release().unwrap();
    compiled.create_infer_request().unwrap().infer().unwrap();

    let stats = runner.handle_stats();
    assert_eq!(stats[&HandleKind::Model], HandleStats { created: 1, released: 1 });
    assert_eq!(stats[&HandleKind::CompiledModel].live(), 1);
    assert_eq!(reader.handle_stats()[&HandleKind::Model].live(), 1);
    assert_eq!(reader.handle_stats()[&HandleKind::InferRequest].created, 0);
}

#[test]
fn test_read_model_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_net(dir.path());
    let engine = Engine::new().unwrap();

    assert!(matches!(
        engine.read_model(dir.path().join("missing.json"), None),
        Err(RuntimeError::ModelLoad(_))
    ));
    assert!(matches!(
        engine.read_model(&path, Some(Path::new("model.bin"))),
        Err(RuntimeError::ModelLoad(_))
    ));
    let onnx = dir.path().join("net.onnx");
    std::fs::write(&onnx, b"\x08\x07").unwrap();
    assert!(matches!(
        engine.read_model(&onnx, None),
        Err(RuntimeError::ModelLoad(_))
    ));
    assert!(matches!(
        engine.read_model_from_memory(b"{ not json", None),
        Err(RuntimeError::ModelLoad(_))
    ));
}

#[test]
fn test_topology_only_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bare.json");
    std::fs::write(&path, common::NET_JSON.replace("\"fc.bias\"]", "\"fc.bias\"], \"out_features\": 1000")).unwrap();
    let engine = Engine::new().unwrap();

    let model = engine.read_model(&path, None).unwrap();
    assert_eq!(model.name(), "bare");
    assert!(!model.has_weights());
    assert_eq!(model.outputs()[0].shape, Shape::matrix(1, CLASSES));
    assert!(matches!(
        engine.compile_model(&model, "CPU"),
        Err(RuntimeError::Compilation { .. })
    ));
}

// ── Compilation and properties ─────────────────────────────────

#[test]
fn test_compile_errors() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new().unwrap();
    let model = engine.read_model(write_net(dir.path()), None).unwrap();

    assert!(matches!(
        engine.compile_model(&model, "GPU"),
        Err(RuntimeError::DeviceNotFound { .. })
    ));
    assert!(matches!(
        engine.compile_model_with_config(&model, "CPU", &properties([("CPU_BIND_THREAD", "YES")])),
        Err(RuntimeError::UnsupportedConfig { .. })
    ));
    assert!(matches!(
        engine.compile_model_with_config(&model, "CPU", &properties([(keys::NUM_STREAMS, "lots")])),
        Err(RuntimeError::UnsupportedConfig { .. })
    ));
}

#[test]
fn test_throughput_streams_raise_optimal_requests() {
    let engine = Engine::new().unwrap();
    let before = engine
        .get_property("CPU", keys::OPTIMAL_NUMBER_OF_INFER_REQUESTS)
        .unwrap();
    assert_eq!(before.as_int(), Some(1));

    engine
        .set_property("CPU", &properties([(keys::CPU_THROUGHPUT_STREAMS, "4")]))
        .unwrap();
    let after = engine
        .get_property("CPU", keys::OPTIMAL_NUMBER_OF_INFER_REQUESTS)
        .unwrap();
    assert_eq!(after.as_int(), Some(4));
}

#[test]
fn test_compile_config_reaches_the_device() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new().unwrap();
    let model = engine.read_model(write_net(dir.path()), None).unwrap();
    assert_eq!(
        engine.get_property("CPU", keys::OPTIMAL_NUMBER_OF_REQUESTS).unwrap().as_int(),
        Some(1)
    );

    let compiled = engine
        .compile_model_with_config(&model, "CPU", &properties([(keys::THROUGHPUT_STREAMS, "4")]))
        .unwrap();
    assert_eq!(
        compiled.get_property(keys::OPTIMAL_NUMBER_OF_REQUESTS).unwrap().as_int(),
        Some(4)
    );
    assert_eq!(compiled.config()[keys::THROUGHPUT_STREAMS], "4");
    assert_eq!(compiled.get_property(keys::NETWORK_NAME).unwrap().to_string(), "net");
    assert_eq!(
        engine.get_property("CPU", keys::OPTIMAL_NUMBER_OF_REQUESTS).unwrap().as_int(),
        Some(4)
    );

    // Device properties written later do not reach an existing compiled model.
    engine
        .set_property("CPU", &properties([(keys::NUM_STREAMS, "2")]))
        .unwrap();
    assert_eq!(compiled.get_property(keys::NUM_STREAMS).unwrap().as_int(), Some(4));
    let recompiled = engine.compile_model(&model, "CPU").unwrap();
    assert_eq!(recompiled.get_property(keys::NUM_STREAMS).unwrap().as_int(), Some(2));
}

#[test]
fn test_mutable_properties_round_trip() {
    let engine = Engine::new().unwrap();
    for (key, value) in [
        (keys::NUM_STREAMS, "4"),
        (keys::THROUGHPUT_STREAMS, "4"),
        (keys::PERFORMANCE_HINT, "THROUGHPUT"),
        (keys::PERFORMANCE_HINT_NUM_REQUESTS, "4"),
        (keys::ENABLE_PROFILING, "YES"),
        (keys::DEVICE_MEMORY_BUDGET, "4M"),
    ] {
        engine.set_property("CPU", &properties([(key, value)])).unwrap();
        assert_eq!(engine.get_property("CPU", key).unwrap().to_string(), value, "{key}");
    }
    assert!(matches!(
        engine.set_property("CPU", &properties([(keys::FULL_DEVICE_NAME, "mine")])),
        Err(RuntimeError::UnsupportedConfig { .. })
    ));
}

#[test]
fn test_profiling_reports_every_layer() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new().unwrap();
    let model = engine.read_model(write_net(dir.path()), None).unwrap();

    let plain = engine.compile_model(&model, "CPU").unwrap();
    let mut request = plain.create_infer_request().unwrap();
    request.infer().unwrap();
    assert!(request.profiling_info().is_empty());
    assert!(request.last_run().is_some());

    let profiled = engine
        .compile_model_with_config(&model, "CPU", &properties([(keys::ENABLE_PROFILING, "YES")]))
        .unwrap();
    let mut request = profiled.create_infer_request().unwrap();
    request.infer().unwrap();
    let names: Vec<_> = request
        .profiling_info()
        .iter()
        .map(|l| l.layer_name.as_str())
        .collect();
    // The identity layer is folded away during compilation.
    assert_eq!(names, vec!["pool", "fc", "prob"]);
    assert!(request.last_run().unwrap().summary().contains("3 layers profiled"));
}

#[test]
fn test_device_budget_limits_requests() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new().unwrap();
    let model = engine.read_model(write_net(dir.path()), None).unwrap();
    // pool [1,3] + fc [1,1000] + prob [1,1000] = 8012 bytes per request.
    let compiled = engine
        .compile_model_with_config(&model, "CPU", &properties([(keys::DEVICE_MEMORY_BUDGET, "10K")]))
        .unwrap();

    let first = compiled.create_infer_request().unwrap();
    let err = compiled.create_infer_request().unwrap_err();
    assert!(matches!(err, RuntimeError::ResourceExhausted { .. }), "{err}");
    drop(first);
    compiled.create_infer_request().unwrap();
}

// ── Binding ────────────────────────────────────────────────────

#[test]
fn test_binding_is_checked() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new().unwrap();
    let model = engine.read_model(write_net(dir.path()), None).unwrap();
    let compiled = engine.compile_model(&model, "CPU").unwrap();
    let frozen = vec![0.0f32; CLASSES];
    let mut request = compiled.create_infer_request().unwrap();

    // Fresh requests come with zeroed inputs and pre-bound outputs.
    assert_eq!(request.get_tensor("data").unwrap().shape(), &Shape::from(INPUT_SHAPE));
    assert_eq!(request.get_output_tensor().unwrap().size(), CLASSES);

    assert!(matches!(
        request.set_input_tensor("pixels", Tensor::zeros(Shape::from(INPUT_SHAPE), DType::F32)),
        Err(RuntimeError::PortNotFound { .. })
    ));
    assert!(matches!(
        request.set_input_tensor("data", Tensor::zeros(Shape::from(INPUT_SHAPE), DType::U8)),
        Err(RuntimeError::TypeMismatch { expected: DType::F32, actual: DType::U8, .. })
    ));
    assert!(matches!(
        request.set_input_tensor("data", Tensor::zeros(Shape::from([1, 3, 32, 32]), DType::F32)),
        Err(RuntimeError::InvalidTensor { .. })
    ));

    assert!(matches!(
        request.set_output_tensor(
            "prob",
            Tensor::from_external_slice(Shape::matrix(1, CLASSES), &frozen).unwrap()
        ),
        Err(RuntimeError::InvalidTensor { .. })
    ));

    request
        .get_tensor_mut("data")
        .unwrap()
        .fill(0.25f32)
        .unwrap();
    request.infer().unwrap();
    let out = request.get_output_tensor().unwrap();
    assert!(matches!(
        out.data::<i32>(),
        Err(TensorError::TypeMismatch { actual: DType::F32, requested: DType::I32 })
    ));
}

// ── Lifetimes ──────────────────────────────────────────────────

#[test]
fn test_every_handle_is_released_once() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new().unwrap();
    {
        let model = engine.read_model(write_net(dir.path()), None).unwrap();
        let compiled = engine.compile_model(&model, "CPU").unwrap();
        let a = compiled.create_infer_request().unwrap();
        let mut b = compiled.create_infer_request().unwrap();
        b.infer().unwrap();

        let stats = engine.handle_stats();
        assert_eq!(stats[&HandleKind::InferRequest].live(), 2);
        a.release().unwrap();
        drop(b);
        compiled.release().unwrap();
        assert_eq!(engine.handle_stats()[&HandleKind::CompiledModel].live(), 0);
    }
    let stats = engine.handle_stats();
    assert_eq!(stats[&HandleKind::Model], HandleStats { created: 1, released: 1 });
    assert_eq!(stats[&HandleKind::CompiledModel], HandleStats { created: 1, released: 1 });
    assert_eq!(stats[&HandleKind::InferRequest], HandleStats { created: 2, released: 2 });
}

#[test]
fn test_unregister_waits_for_compiled_models() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new().unwrap();
    let model = engine.read_model(write_net(dir.path()), None).unwrap();

    let compiled = engine.compile_model(&model, "CPU").unwrap();
    assert!(matches!(
        engine.unregister_plugin("CPU"),
        Err(RuntimeError::DeviceBusy { live: 1, .. })
    ));
    // Still usable after the refused unregister.
    compiled.create_infer_request().unwrap().infer().unwrap();

    drop(compiled);
    engine.unregister_plugin("CPU").unwrap();
    assert!(matches!(
        engine.compile_model(&model, "CPU"),
        Err(RuntimeError::DeviceNotFound { .. })
    ));
}

#[test]
fn test_engine_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("engine.toml");
    std::fs::write(
        &config,
        r#"
        [[plugins]]
        device = "CPU"
        plugin = "reference_cpu"
        [plugins.properties]
        NUM_STREAMS = 3

        [[plugins]]
        device = "CPU_AUX"
        plugin = "cpu"
        "#,
    )
    .unwrap();

    let engine = Engine::with_config(&config).unwrap();
    assert_eq!(engine.available_devices(), vec!["CPU", "CPU_AUX"]);
    assert_eq!(engine.get_property("CPU", keys::NUM_STREAMS).unwrap().as_int(), Some(3));
    assert_eq!(engine.get_property("CPU_AUX", keys::NUM_STREAMS).unwrap().as_int(), Some(1));

    let other = Engine::without_devices().unwrap();
    other.register_plugins_from_config(&config).unwrap();
    assert_eq!(other.available_devices().len(), 2);
    assert!(matches!(
        other.register_plugins_from_config(dir.path().join("absent.toml")),
        Err(RuntimeError::Config(_))
    ));
}
