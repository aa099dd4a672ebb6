// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device selection, build configuration and the cache-aware build.
//!
//! ```text
//! Compilation::new ──► set_device ──► [set_cache_dir] ──► build
//!                         │                                 │
//!                         └─ set_performance / set_priority │
//!                            / set_enable_fp16              ▼
//!                                                      ExecutionPlan
//! ```
//!
//! Every setter fails with `OperationForbidden` before a device is selected
//! or after a successful build. A `Compilation` is meant for use from one
//! thread at a time; all mutating calls take `&mut self`.

use crate::cache::CacheStore;
use crate::{ExecutionPlan, RuntimeError};
use device_hal::{Device, DeviceManager, ModelConfig, PerformanceMode, PreparedModel, Priority};
use model_ir::{graph::Validated, ModelGraph};
use std::path::Path;
use std::sync::Arc;

/// Strategy used by [`Compilation::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    /// No cache directory: compiled directly.
    Direct,
    /// Cache directory without a manifest: compiled and written.
    Generated,
    /// Cached version was older: old files removed, compiled and written.
    Regenerated,
    /// Cached version matched: restored from the cache.
    LoadedFromCache,
}

impl std::fmt::Display for BuildKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Direct => "direct",
            Self::Generated => "generated cache",
            Self::Regenerated => "regenerated cache",
            Self::LoadedFromCache => "loaded from cache",
        };
        f.write_str(s)
    }
}

struct SelectedDevice {
    id: u64,
    device: Arc<dyn Device>,
}

struct CacheSettings {
    store: CacheStore,
    version: u32,
}

/// Compiles one graph for one device.
pub struct Compilation {
    graph: ModelGraph<Validated>,
    manager: Arc<DeviceManager>,
    device: Option<SelectedDevice>,
    cache: Option<CacheSettings>,
    config: ModelConfig,
    plan: Option<Arc<ExecutionPlan>>,
}

impl Compilation {
    pub fn new(graph: ModelGraph<Validated>, manager: Arc<DeviceManager>) -> Self {
        Self {
            graph,
            manager,
            device: None,
            cache: None,
            config: ModelConfig::default(),
            plan: None,
        }
    }

    pub fn graph(&self) -> &ModelGraph<Validated> {
        &self.graph
    }

    pub fn device_manager(&self) -> &Arc<DeviceManager> {
        &self.manager
    }

    /// Id of the selected device, if any.
    pub fn device_id(&self) -> Option<u64> {
        self.device.as_ref().map(|d| d.id)
    }

    /// Canonical cache directory, if one was set.
    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache.as_ref().map(|c| c.store.dir())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn is_built(&self) -> bool {
        self.plan.is_some()
    }

    /// The plan produced by [`build`](Self::build).
    pub fn execution_plan(&self) -> Result<Arc<ExecutionPlan>, RuntimeError> {
        self.plan.clone().ok_or_else(|| {
            RuntimeError::OperationForbidden("compilation has not been built".into())
        })
    }

    /// Selects the target device.
    ///
    /// Every node of the graph must be supported by the device, and a graph
    /// with dynamic inputs needs a device that accepts them. Selecting a
    /// different device clears the cache directory and build options.
    pub fn set_device(&mut self, id: u64) -> Result<(), RuntimeError> {
        self.ensure_not_built("set_device")?;
        let device = self.manager.get_device(id).ok_or_else(|| {
            RuntimeError::InvalidParameter(format!("no device registered with id {id}"))
        })?;

        let supported = device.supported_operations(&self.graph)?;
        if supported.len() != self.graph.num_nodes() {
            return Err(RuntimeError::Failed(format!(
                "device reported {} flags for {} nodes",
                supported.len(),
                self.graph.num_nodes()
            )));
        }
        if let Some(pos) = supported.iter().position(|s| !s) {
            let node = &self.graph.nodes[pos];
            return Err(RuntimeError::OperationForbidden(format!(
                "device {id} does not support node '{}' ({})",
                node.name, node.op
            )));
        }
        if self.graph.has_dynamic_input() && !device.is_dynamic_input_supported()? {
            return Err(RuntimeError::OperationForbidden(format!(
                "graph has dynamic inputs but device {id} does not accept them"
            )));
        }

        if self.device.as_ref().is_some_and(|d| d.id != id) {
            tracing::debug!("device changed to {id}, resetting cache and build options");
            self.cache = None;
            self.config = ModelConfig::default();
        }
        tracing::debug!("compilation: device {id} selected");
        self.device = Some(SelectedDevice { id, device });
        Ok(())
    }

    /// Enables the on-disk cache in `path` for artifact `version`.
    pub fn set_cache_dir(&mut self, path: &Path, version: u32) -> Result<(), RuntimeError> {
        let device = self.configurable_device("set_cache_dir")?;
        if !device.is_model_cache_supported()? {
            return Err(RuntimeError::OperationForbidden(
                "device does not support model caching".into(),
            ));
        }
        let store = CacheStore::open(path)?;
        tracing::debug!("compilation: cache dir {} version {version}", store.dir().display());
        self.cache = Some(CacheSettings { store, version });
        Ok(())
    }

    pub fn set_performance(&mut self, mode: PerformanceMode) -> Result<(), RuntimeError> {
        let device = self.configurable_device("set_performance")?;
        if !device.is_performance_mode_supported()? {
            return Err(RuntimeError::OperationForbidden(
                "device does not support performance modes".into(),
            ));
        }
        self.config.performance = mode;
        Ok(())
    }

    pub fn set_priority(&mut self, priority: Priority) -> Result<(), RuntimeError> {
        let device = self.configurable_device("set_priority")?;
        if !device.is_priority_supported()? {
            return Err(RuntimeError::OperationForbidden(
                "device does not support priorities".into(),
            ));
        }
        self.config.priority = priority;
        Ok(())
    }

    pub fn set_enable_fp16(&mut self, enable: bool) -> Result<(), RuntimeError> {
        let device = self.configurable_device("set_enable_fp16")?;
        if !device.is_fp16_supported()? {
            return Err(RuntimeError::OperationForbidden(
                "device does not support fp16".into(),
            ));
        }
        self.config.enable_fp16 = enable;
        Ok(())
    }

    /// Compiles the graph, using the cache directory if one is set.
    ///
    /// With a cache directory the on-disk manifest decides the strategy:
    /// none present generates it, an older version is removed and
    /// regenerated, an equal version is loaded after checking the device id
    /// and every chunk checksum, and a newer version is refused with
    /// `OperationForbidden` without touching any file.
    pub fn build(&mut self) -> Result<BuildKind, RuntimeError> {
        self.ensure_not_built("build")?;
        let selected = self.device.as_ref().ok_or_else(|| {
            RuntimeError::OperationForbidden("build requires a device".into())
        })?;
        let device = Arc::clone(&selected.device);
        let device_id = selected.id;

        let (model, kind) = match &self.cache {
            None => (device.prepare_model(&self.graph, &self.config)?, BuildKind::Direct),
            Some(cache) => self.build_with_cache(&device, device_id, cache)?,
        };

        self.plan = Some(Arc::new(ExecutionPlan::new(model, device)));
        tracing::info!("compilation of '{}' built ({kind})", self.graph.name);
        Ok(kind)
    }

    fn build_with_cache(
        &self,
        device: &Arc<dyn Device>,
        device_id: u64,
        cache: &CacheSettings,
    ) -> Result<(Box<dyn PreparedModel>, BuildKind), RuntimeError> {
        let store = &cache.store;
        let requested = u64::from(cache.version);

        if !store.has_manifest() {
            let model = self.generate_cache(device, device_id, cache)?;
            return Ok((model, BuildKind::Generated));
        }

        let manifest = store.read_manifest()?;
        if requested > manifest.version {
            tracing::info!(
                "cache version {} is older than requested {requested}, regenerating",
                manifest.version
            );
            store.remove(&manifest)?;
            let model = self.generate_cache(device, device_id, cache)?;
            return Ok((model, BuildKind::Regenerated));
        }
        if requested < manifest.version {
            return Err(RuntimeError::OperationForbidden(format!(
                "cached version {} is newer than requested {requested}",
                manifest.version
            )));
        }
        if manifest.device_id != device_id {
            return Err(RuntimeError::InvalidFile(format!(
                "cache was produced by device {}, not {device_id}",
                manifest.device_id
            )));
        }

        let chunks = store.load(&manifest)?;
        let model = device.prepare_model_from_cache(&chunks.as_slices(), &self.config)?;
        Ok((model, BuildKind::LoadedFromCache))
    }

    fn generate_cache(
        &self,
        device: &Arc<dyn Device>,
        device_id: u64,
        cache: &CacheSettings,
    ) -> Result<Box<dyn PreparedModel>, RuntimeError> {
        let model = device.prepare_model(&self.graph, &self.config)?;
        let chunks = model.export_cache()?;
        cache
            .store
            .write(&chunks, u64::from(cache.version), device_id)?;
        Ok(model)
    }

    fn ensure_not_built(&self, op: &str) -> Result<(), RuntimeError> {
        if self.is_built() {
            return Err(RuntimeError::OperationForbidden(format!(
                "{op} called after build"
            )));
        }
        Ok(())
    }

    fn configurable_device(&self, op: &str) -> Result<Arc<dyn Device>, RuntimeError> {
        self.ensure_not_built(op)?;
        self.device
            .as_ref()
            .map(|d| Arc::clone(&d.device))
            .ok_or_else(|| RuntimeError::OperationForbidden(format!("{op} requires a device")))
    }
}

impl std::fmt::Debug for Compilation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compilation")
            .field("graph", &self.graph.name)
            .field("device", &self.device_id())
            .field("cache_dir", &self.cache_dir())
            .field("config", &self.config)
            .field("built", &self.is_built())
            .finish()
    }
}
