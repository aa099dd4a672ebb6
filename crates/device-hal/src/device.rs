// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The capability interface every back-end implements.

use crate::{
    Capabilities, DeviceError, DeviceStatus, DeviceType, ModelConfig, PreparedModel,
};
use memory_manager::MemoryRegion;
use model_ir::{graph::Validated, ModelGraph};

/// A back-end capable of compiling and executing graphs.
///
/// Every call is synchronous. Driver-backed implementations block for the
/// duration of the driver round trip.
pub trait Device: Send + Sync {
    /// Human-readable device name.
    fn name(&self) -> Result<String, DeviceError>;

    /// Vendor string.
    fn vendor(&self) -> Result<String, DeviceError>;

    fn device_type(&self) -> Result<DeviceType, DeviceError>;

    fn status(&self) -> Result<DeviceStatus, DeviceError>;

    /// Returns one flag per graph node, in node order.
    fn supported_operations(&self, graph: &ModelGraph<Validated>)
        -> Result<Vec<bool>, DeviceError>;

    fn is_fp16_supported(&self) -> Result<bool, DeviceError>;

    fn is_performance_mode_supported(&self) -> Result<bool, DeviceError>;

    fn is_priority_supported(&self) -> Result<bool, DeviceError>;

    fn is_dynamic_input_supported(&self) -> Result<bool, DeviceError>;

    fn is_model_cache_supported(&self) -> Result<bool, DeviceError>;

    /// Compiles `graph` into a device artifact.
    fn prepare_model(
        &self,
        graph: &ModelGraph<Validated>,
        config: &ModelConfig,
    ) -> Result<Box<dyn PreparedModel>, DeviceError>;

    /// Rebuilds an artifact from chunks previously produced by
    /// [`PreparedModel::export_cache`].
    fn prepare_model_from_cache(
        &self,
        chunks: &[&[u8]],
        config: &ModelConfig,
    ) -> Result<Box<dyn PreparedModel>, DeviceError>;

    /// Allocates `len` bytes of device memory. `len == 0` is rejected.
    fn allocate_buffer(&self, len: usize) -> Result<MemoryRegion, DeviceError>;

    /// Returns a buffer obtained from [`allocate_buffer`](Device::allocate_buffer).
    fn release_buffer(&self, region: &MemoryRegion) -> Result<(), DeviceError>;

    /// Queries all five capability flags.
    fn capabilities(&self) -> Result<Capabilities, DeviceError> {
        Ok(Capabilities {
            fp16: self.is_fp16_supported()?,
            performance_mode: self.is_performance_mode_supported()?,
            priority: self.is_priority_supported()?,
            dynamic_input: self.is_dynamic_input_supported()?,
            model_cache: self.is_model_cache_supported()?,
        })
    }
}
