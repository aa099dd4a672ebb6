// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and the helpers they share.

pub mod cache_info;
pub mod compile;
pub mod devices;
pub mod run;

use device_hal::{Device, DeviceManager, ReferenceDevice};
use model_ir::GraphLoader;
use runtime::{BuildKind, Compilation, RuntimeConfig};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `-v` flags.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    match path {
        Some(path) => {
            tracing::debug!("loading configuration from {}", path.display());
            Ok(RuntimeConfig::from_file(path)?)
        }
        None => Ok(RuntimeConfig::default()),
    }
}

/// Creates the device registry with the reference device registered.
///
/// The reference device is returned as well so commands can report its
/// memory statistics.
pub fn device_manager(
    config: &RuntimeConfig,
) -> anyhow::Result<(Arc<DeviceManager>, Arc<ReferenceDevice>)> {
    let manager = Arc::new(DeviceManager::new());
    let reference = Arc::new(ReferenceDevice::new(config.reference_options()?));
    let device: Arc<dyn Device> = reference.clone();
    manager.register(|| Some(device))?;
    Ok((manager, reference))
}

/// Loads `graph`, applies `config` and builds the compilation.
pub fn compile(
    config: &RuntimeConfig,
    manager: Arc<DeviceManager>,
    graph: &Path,
) -> anyhow::Result<(Compilation, BuildKind)> {
    let graph = GraphLoader::load(graph).map_err(|e| {
        anyhow::anyhow!("failed to load graph from '{}': {e}", graph.display())
    })?;
    let mut compilation = Compilation::new(graph, manager);
    config.configure(&mut compilation)?;
    let kind = compilation.build()?;
    Ok((compilation, kind))
}
