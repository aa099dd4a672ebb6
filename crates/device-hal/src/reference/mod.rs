// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! In-process reference back-end.
//!
//! Executes a small set of f32 elementwise operations on the host. Device
//! memory comes from a budgeted [`MemoryPool`], so allocation failures and
//! buffer leaks behave the way they would on real hardware.

mod kernels;
mod model;

use crate::{
    Device, DeviceError, DeviceStatus, DeviceType, ModelConfig, PreparedModel,
};
use memory_manager::{AllocationStats, MemoryBudget, MemoryError, MemoryPool, MemoryRegion};
use model::ReferencePreparedModel;
use model_ir::{graph::Validated, GraphLoader, ModelGraph, OpType};

pub use kernels::is_supported;

/// Construction options for a [`ReferenceDevice`].
#[derive(Debug, Clone)]
pub struct ReferenceOptions {
    pub name: String,
    pub vendor: String,
    pub memory_budget: MemoryBudget,
    pub enable_fp16: bool,
    pub performance_mode: bool,
    pub priority: bool,
    pub dynamic_input: bool,
    pub model_cache: bool,
}

impl Default for ReferenceOptions {
    fn default() -> Self {
        Self {
            name: "reference-cpu".to_string(),
            vendor: "nnrt".to_string(),
            memory_budget: MemoryBudget::from_mb(256),
            enable_fp16: false,
            performance_mode: true,
            priority: true,
            dynamic_input: true,
            model_cache: true,
        }
    }
}

/// Host-memory device that interprets graphs node by node.
pub struct ReferenceDevice {
    options: ReferenceOptions,
    pool: MemoryPool,
}

impl ReferenceDevice {
    pub fn new(options: ReferenceOptions) -> Self {
        let pool = MemoryPool::new(options.memory_budget);
        Self { options, pool }
    }

    /// Allocation statistics of the device memory pool.
    pub fn memory_stats(&self) -> AllocationStats {
        self.pool.stats()
    }

    /// Number of buffers currently handed out and not yet released.
    pub fn live_buffers(&self) -> usize {
        self.pool.live_regions()
    }

    fn check_graph(
        &self,
        graph: &ModelGraph<Validated>,
        config: &ModelConfig,
    ) -> Result<(), DeviceError> {
        if let Some(node) = graph.iter_nodes().find(|n| !is_supported(n.op)) {
            return Err(DeviceError::InvalidParameter(format!(
                "node '{}': operation '{}' is not supported by {}",
                node.name, node.op, self.options.name
            )));
        }
        if config.enable_fp16 && !self.options.enable_fp16 {
            return Err(DeviceError::InvalidParameter(
                "fp16 requested but not supported".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ReferenceDevice {
    fn default() -> Self {
        Self::new(ReferenceOptions::default())
    }
}

impl Device for ReferenceDevice {
    fn name(&self) -> Result<String, DeviceError> {
        Ok(self.options.name.clone())
    }

    fn vendor(&self) -> Result<String, DeviceError> {
        Ok(self.options.vendor.clone())
    }

    fn device_type(&self) -> Result<DeviceType, DeviceError> {
        Ok(DeviceType::Cpu)
    }

    fn status(&self) -> Result<DeviceStatus, DeviceError> {
        Ok(DeviceStatus::Available)
    }

    fn supported_operations(
        &self,
        graph: &ModelGraph<Validated>,
    ) -> Result<Vec<bool>, DeviceError> {
        Ok(graph.iter_nodes().map(|n| is_supported(n.op)).collect())
    }

    fn is_fp16_supported(&self) -> Result<bool, DeviceError> {
        Ok(self.options.enable_fp16)
    }

    fn is_performance_mode_supported(&self) -> Result<bool, DeviceError> {
        Ok(self.options.performance_mode)
    }

    fn is_priority_supported(&self) -> Result<bool, DeviceError> {
        Ok(self.options.priority)
    }

    fn is_dynamic_input_supported(&self) -> Result<bool, DeviceError> {
        Ok(self.options.dynamic_input)
    }

    fn is_model_cache_supported(&self) -> Result<bool, DeviceError> {
        Ok(self.options.model_cache)
    }

    fn prepare_model(
        &self,
        graph: &ModelGraph<Validated>,
        config: &ModelConfig,
    ) -> Result<Box<dyn PreparedModel>, DeviceError> {
        self.check_graph(graph, config)?;
        tracing::debug!(
            "{}: prepared '{}' ({} nodes)",
            self.options.name,
            graph.name,
            graph.num_nodes()
        );
        Ok(Box::new(ReferencePreparedModel::new(graph.clone(), *config)))
    }

    fn prepare_model_from_cache(
        &self,
        chunks: &[&[u8]],
        config: &ModelConfig,
    ) -> Result<Box<dyn PreparedModel>, DeviceError> {
        let [graph_chunk, config_chunk] = chunks else {
            return Err(DeviceError::InvalidParameter(format!(
                "expected 2 cache chunks, got {}",
                chunks.len()
            )));
        };
        let graph = GraphLoader::from_slice(graph_chunk)
            .map_err(|e| DeviceError::InvalidParameter(format!("cached graph: {e}")))?;
        let cached: ModelConfig = serde_json::from_slice(config_chunk)
            .map_err(|e| DeviceError::InvalidParameter(format!("cached config: {e}")))?;
        if cached != *config {
            tracing::debug!(
                "{}: cached config {cached:?} differs from {config:?}, using the new one",
                self.options.name
            );
        }
        self.prepare_model(&graph, config)
    }

    fn allocate_buffer(&self, len: usize) -> Result<MemoryRegion, DeviceError> {
        if len == 0 {
            return Err(DeviceError::InvalidParameter("cannot allocate 0 bytes".into()));
        }
        Ok(self.pool.allocate(len)?)
    }

    fn release_buffer(&self, region: &MemoryRegion) -> Result<(), DeviceError> {
        self.pool.release(region).map_err(|e| match e {
            MemoryError::UnknownRegion(id) => DeviceError::InvalidParameter(format!(
                "buffer {id} was not allocated by {} or is already released",
                self.options.name
            )),
            other => DeviceError::Memory(other),
        })
    }
}

impl std::fmt::Debug for ReferenceDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceDevice")
            .field("name", &self.options.name)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Ops the reference device can execute.
pub const SUPPORTED_OPS: [OpType; 8] = [
    OpType::Add,
    OpType::Sub,
    OpType::Mul,
    OpType::Div,
    OpType::Maximum,
    OpType::Minimum,
    OpType::Relu,
    OpType::Identity,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IoTensor;
    use model_ir::Node;
    use tensor_core::{DType, Shape, TensorDesc};

    fn f32_desc(dims: &[i64]) -> TensorDesc {
        TensorDesc::new(DType::F32, Shape::from(dims))
    }

    fn add_relu_graph() -> ModelGraph<Validated> {
        ModelGraph::new(
            "add_relu".into(),
            vec![f32_desc(&[3]), f32_desc(&[3]), f32_desc(&[3]), f32_desc(&[3])],
            vec![
                Node::new("add", OpType::Add, vec![0, 1], vec![2]),
                Node::new("relu", OpType::Relu, vec![2], vec![3]),
            ],
            vec![0, 1],
            vec![3],
        )
        .validate()
        .unwrap()
    }

    fn bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    fn io(device: &ReferenceDevice, desc: TensorDesc, data: &[u8], len: usize) -> IoTensor {
        let memory = device.allocate_buffer(len).unwrap();
        memory.write(0, data).unwrap();
        IoTensor { desc, memory, length: len }
    }

    #[test]
    fn test_run_add_relu() {
        let device = ReferenceDevice::default();
        let graph = add_relu_graph();
        let model = device.prepare_model(&graph, &ModelConfig::default()).unwrap();

        let a = io(&device, f32_desc(&[3]), &bytes(&[1.0, -5.0, 2.0]), 12);
        let b = io(&device, f32_desc(&[3]), &bytes(&[1.0, 1.0, 0.5]), 12);
        let out = io(&device, f32_desc(&[3]), &[], 12);

        let outcome = model.run(&[a, b], &[out.clone()]).unwrap();
        assert_eq!(outcome.output_dims, vec![vec![3]]);
        assert_eq!(outcome.buffer_sufficient, vec![true]);

        let mut raw = [0u8; 12];
        out.memory.read(0, &mut raw).unwrap();
        assert_eq!(raw.to_vec(), bytes(&[2.0, 0.0, 2.5]));
    }

    #[test]
    fn test_output_too_small() {
        let device = ReferenceDevice::default();
        let model = device.prepare_model(&add_relu_graph(), &ModelConfig::default()).unwrap();
        let a = io(&device, f32_desc(&[3]), &bytes(&[1.0; 3]), 12);
        let b = io(&device, f32_desc(&[3]), &bytes(&[1.0; 3]), 12);
        let out = io(&device, f32_desc(&[3]), &[], 4);

        let outcome = model.run(&[a, b], &[out]).unwrap();
        assert_eq!(outcome.buffer_sufficient, vec![false]);
        assert_eq!(outcome.output_dims, vec![vec![3]]);
    }

    #[test]
    fn test_unsupported_op() {
        let device = ReferenceDevice::default();
        let graph = ModelGraph::new(
            "mm".into(),
            vec![f32_desc(&[2, 2]), f32_desc(&[2, 2]), f32_desc(&[2, 2])],
            vec![Node::new("mm", OpType::MatMul, vec![0, 1], vec![2])],
            vec![0, 1],
            vec![2],
        )
        .validate()
        .unwrap();

        assert_eq!(device.supported_operations(&graph).unwrap(), vec![false]);
        assert!(matches!(
            device.prepare_model(&graph, &ModelConfig::default()),
            Err(DeviceError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_cache_roundtrip() {
        let device = ReferenceDevice::default();
        let graph = add_relu_graph();
        let config = ModelConfig::default();
        let model = device.prepare_model(&graph, &config).unwrap();

        let chunks = model.export_cache().unwrap();
        assert_eq!(chunks.len(), 2);
        let refs: Vec<&[u8]> = chunks.iter().map(Vec::as_slice).collect();
        let restored = device.prepare_model_from_cache(&refs, &config).unwrap();
        assert_eq!(restored.export_cache().unwrap(), chunks);
    }

    #[test]
    fn test_cache_wrong_chunk_count() {
        let device = ReferenceDevice::default();
        let one: &[u8] = b"{}";
        assert!(matches!(
            device.prepare_model_from_cache(&[one], &ModelConfig::default()),
            Err(DeviceError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_buffer_lifecycle() {
        let device = ReferenceDevice::default();
        assert!(device.allocate_buffer(0).is_err());

        let buf = device.allocate_buffer(64).unwrap();
        assert_eq!(device.live_buffers(), 1);
        device.release_buffer(&buf).unwrap();
        assert_eq!(device.live_buffers(), 0);
        assert!(matches!(
            device.release_buffer(&buf),
            Err(DeviceError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_fp16_rejected_when_disabled() {
        let device = ReferenceDevice::default();
        let config = ModelConfig { enable_fp16: true, ..Default::default() };
        assert!(device.prepare_model(&add_relu_graph(), &config).is_err());
    }

    #[test]
    fn test_default_capabilities() {
        let caps = ReferenceDevice::default().capabilities().unwrap();
        assert!(!caps.fp16);
        assert!(caps.performance_mode && caps.priority && caps.dynamic_input && caps.model_cache);
    }
}
