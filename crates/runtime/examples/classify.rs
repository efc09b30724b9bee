// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: classify a synthetic image with a model from disk.
//!
//! Reads `<model>.xml` (weights from the `<model>.bin` sibling), compiles
//! it for the requested device with profiling on, runs one synchronous and
//! one asynchronous inference and prints the top classes.
//!
//! ```bash
//! cargo run -p infer-runtime --example classify -- net.xml CPU
//! ```

use infer_runtime::{keys, properties, Engine, Tensor};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let mut args = std::env::args().skip(1);
    let model_path = args.next().ok_or("usage: classify <model.xml> [device]")?;
    let device = args.next().unwrap_or_else(|| "CPU".to_string());

    let engine = Engine::new()?;
    println!("Devices: {}", engine.available_devices().join(", "));

    let model = engine.read_model(&model_path, None)?;
    println!("Model: {}\n", model.summary());

    let compiled = engine.compile_model_with_config(
        &model,
        &device,
        &properties([(keys::ENABLE_PROFILING, "YES")]),
    )?;
    println!(
        "Optimal requests on {device}: {}",
        compiled.get_property(keys::OPTIMAL_NUMBER_OF_REQUESTS)?
    );

    // A horizontal gradient in every channel.
    let port = &model.inputs()[0];
    let count = port.shape.num_elements();
    let width = port.shape.last_dim().unwrap_or(1).max(1);
    let pixels: Vec<f32> = (0..count).map(|i| (i % width) as f32 / width as f32).collect();

    let mut request = compiled.create_infer_request()?;
    request.set_input_tensor(&port.name, Tensor::from_f32(port.shape.clone(), &pixels)?)?;

    request.infer()?;
    let sync_scores = request.get_output_tensor()?.detach();

    request.start_async()?;
    request.wait()?;
    let scores = request.get_output_tensor()?.data::<f32>()?;
    assert_eq!(scores, sync_scores.data::<f32>()?);

    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    println!("\n{:<8} {:>10}", "Class", "Score");
    println!("{}", "-".repeat(19));
    for (class, score) in ranked.iter().take(5) {
        println!("{class:<8} {score:>10.6}");
    }

    println!("\n{:<20} {:<16} {:>12}", "Layer", "Type", "Time (us)");
    println!("{}", "-".repeat(50));
    for layer in request.profiling_info() {
        println!(
            "{:<20} {:<16} {:>12}",
            layer.layer_name,
            layer.layer_type,
            layer.compute_duration.as_micros()
        );
    }
    if let Some(report) = request.last_run() {
        println!("\n{}", report.summary());
    }

    Ok(())
}
