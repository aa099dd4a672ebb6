// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: compile a graph twice against the same cache directory.
//!
//! The first build prepares the model and writes the cache; the second
//! loads it back after verifying the manifest and chunk checksums.
//!
//! ```bash
//! cargo run -p runtime --example cached_compile
//! ```

use device_hal::{DeviceManager, ReferenceOptions};
use model_ir::{graph::Validated, ModelError, ModelGraph, Node, OpType};
use runtime::{CacheStore, Compilation, Executor};
use std::sync::Arc;
use tensor_core::{DType, Shape, TensorDesc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let manager = Arc::new(DeviceManager::new());
    let id = manager.init(ReferenceOptions::default())?;
    println!("Device: {} ({id:#018x})\n", manager.get_device_name(id));

    let dir = std::env::temp_dir().join("nnrt-cached-compile");
    std::fs::create_dir_all(&dir)?;

    for attempt in 1..=2 {
        let mut compilation = Compilation::new(build_graph(8)?, Arc::clone(&manager));
        compilation.set_device(id)?;
        compilation.set_cache_dir(&dir, 1)?;
        let kind = compilation.build()?;
        println!("build #{attempt}: {kind}");

        let desc = compilation.graph().input_descs()[0].clone();
        let a: Vec<u8> = (0..8).flat_map(|i| (i as f32 - 4.0).to_ne_bytes()).collect();
        let b: Vec<u8> = (0..8).flat_map(|_| 1.5f32.to_ne_bytes()).collect();
        let mut out = vec![0u8; 32];

        let mut exec = Executor::new(&compilation)?;
        exec.set_input(0, &desc, &a)?;
        exec.set_input(1, &desc, &b)?;
        exec.set_output(0, &mut out)?;
        exec.run()?;
        let shape = exec.get_output_shape(0)?;
        drop(exec);

        let values: Vec<f32> = out
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        println!("  relu(a + b) {shape:?} = {values:?}");
    }

    let store = CacheStore::open(&dir)?;
    let manifest = store.read_manifest()?;
    println!(
        "\nCache: version {}, {} chunk(s), checksums {:04x?}",
        manifest.version,
        manifest.file_count(),
        manifest.checksums
    );
    store.remove(&manifest)?;
    Ok(())
}

/// `relu(a + b)` over `len` f32 elements.
fn build_graph(len: i64) -> Result<ModelGraph<Validated>, ModelError> {
    let desc = || TensorDesc::new(DType::F32, Shape::new(vec![len]));
    ModelGraph::new(
        "add-relu".into(),
        vec![desc(), desc(), desc(), desc()],
        vec![
            Node::new("add", OpType::Add, vec![0, 1], vec![2]),
            Node::new("relu", OpType::Relu, vec![2], vec![3]),
        ],
        vec![0, 1],
        vec![3],
    )
    .validate()
}
