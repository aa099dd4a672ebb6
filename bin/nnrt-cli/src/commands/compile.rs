// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `nnrt compile` command: build a graph and report the cache outcome.

use runtime::RuntimeConfig;
use std::path::PathBuf;

pub async fn execute(config: RuntimeConfig, graph: PathBuf) -> anyhow::Result<()> {
    let (manager, _) = super::device_manager(&config)?;
    let (compilation, kind) = super::compile(&config, manager, &graph)?;

    println!("  Graph:   {}", compilation.graph().summary());
    if let Some(id) = compilation.device_id() {
        println!(
            "  Device:  {} ({id:#018x})",
            compilation.device_manager().get_device_name(id)
        );
    }
    match compilation.cache_dir() {
        Some(dir) => println!("  Cache:   {} (version {})", dir.display(), config.cache_version),
        None => println!("  Cache:   disabled"),
    }
    println!("  Build:   {kind}");

    let plan = compilation.execution_plan()?;
    match plan.input_dim_ranges() {
        Ok(ranges) => {
            for (index, (min, max)) in ranges.min.iter().zip(&ranges.max).enumerate() {
                println!("  Input {index}: dims {min:?} ..= {max:?}");
            }
        }
        Err(e) if e.is_not_supported() => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
