// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `nnrt run` command: compile, bind constant inputs and run once.
//!
//! Inputs are copied into runtime-owned buffers. Outputs live in memory
//! registered with the executor, so the run can move to a blocking worker
//! under the configured timeout.

use runtime::{Executor, RuntimeConfig};
use std::path::PathBuf;
use tensor_core::{DType, Shape, TensorDesc, DYNAMIC_DIM};

pub async fn execute(
    config: RuntimeConfig,
    graph: PathBuf,
    fill: f32,
    dynamic_output_bytes: usize,
) -> anyhow::Result<()> {
    let (manager, reference) = super::device_manager(&config)?;
    let (compilation, kind) = super::compile(&config, manager, &graph)?;
    println!("  Graph: {} ({kind})", compilation.graph().summary());

    let input_descs = compilation.graph().input_descs();
    let output_descs = compilation.graph().output_descs();
    let mut exec = Executor::new(&compilation)?;

    // ── Inputs ─────────────────────────────────────────────────
    for (index, declared) in input_descs.iter().enumerate() {
        let desc = resolve(declared);
        let data = filled(&desc, fill)?;
        exec.set_input(index, &desc, &data)?;
        println!("  in[{index}]  {} {}", desc.dtype, desc.shape);
    }

    // ── Outputs ────────────────────────────────────────────────
    let mut regions = Vec::with_capacity(output_descs.len());
    for (index, declared) in output_descs.iter().enumerate() {
        let len = if declared.shape.is_dynamic() {
            dynamic_output_bytes
        } else {
            declared.byte_size()?
        };
        let region = exec.create_output_memory(index, len)?;
        exec.set_output_from_memory(index, &region)?;
        regions.push(region);
    }

    let exec = exec.run_async(config.run_timeout()).await?;

    for (index, region) in regions.iter().enumerate() {
        let dims = exec.get_output_shape(index)?;
        let desc = TensorDesc::new(output_descs[index].dtype, Shape::new(dims.clone()));
        let len = desc.byte_size()?;
        let mut bytes = vec![0u8; len];
        region.read(0, &mut bytes)?;
        println!("  out[{index}] {} {:?} {}", desc.dtype, dims, preview(desc.dtype, &bytes));
    }

    // Dropping the executor returns every buffer it allocated.
    drop(exec);
    println!();
    println!("  Reference memory:");
    println!("   {}", reference.memory_stats().summary());
    Ok(())
}

/// Replaces every dynamic dimension with 1.
fn resolve(declared: &TensorDesc) -> TensorDesc {
    let dims = declared
        .shape
        .dims()
        .iter()
        .map(|&d| if d == DYNAMIC_DIM { 1 } else { d })
        .collect();
    TensorDesc {
        shape: Shape::new(dims),
        ..declared.clone()
    }
}

fn filled(desc: &TensorDesc, value: f32) -> anyhow::Result<Vec<u8>> {
    let len = desc.byte_size()?;
    if desc.dtype != DType::F32 {
        return Ok(vec![0; len]);
    }
    Ok(value.to_ne_bytes().iter().copied().cycle().take(len).collect())
}

/// Renders up to eight leading values.
fn preview(dtype: DType, bytes: &[u8]) -> String {
    if dtype != DType::F32 {
        return format!("<{} bytes>", bytes.len());
    }
    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let shown: Vec<String> = values.iter().take(8).map(|v| format!("{v}")).collect();
    let more = if values.len() > 8 { ", ..." } else { "" };
    format!("[{}{more}]", shown.join(", "))
}
