// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Binding of a compiled artifact to the device that owns it.

use crate::RuntimeError;
use device_hal::{Device, DeviceError, DimRanges, IoTensor, PreparedModel, RunOutcome};
use std::sync::Arc;

/// A compiled artifact plus the device that compiled it.
///
/// Every buffer an executor allocates is routed through
/// [`input_device`](Self::input_device) or
/// [`output_device`](Self::output_device), so memory always goes back to the
/// device it came from.
pub struct ExecutionPlan {
    model: Box<dyn PreparedModel>,
    device: Arc<dyn Device>,
}

impl ExecutionPlan {
    pub fn new(model: Box<dyn PreparedModel>, device: Arc<dyn Device>) -> Self {
        Self { model, device }
    }

    /// Device that allocates input buffers.
    pub fn input_device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Device that allocates output buffers. Same as the input device today.
    pub fn output_device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    pub fn run(
        &self,
        inputs: &[IoTensor],
        outputs: &[IoTensor],
    ) -> Result<RunOutcome, RuntimeError> {
        Ok(self.model.run(inputs, outputs)?)
    }

    pub fn input_dim_ranges(&self) -> Result<DimRanges, DeviceError> {
        self.model.input_dim_ranges()
    }

    pub fn export_cache(&self) -> Result<Vec<Vec<u8>>, RuntimeError> {
        Ok(self.model.export_cache()?)
    }
}

impl std::fmt::Debug for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPlan")
            .field("device", &self.device.name().unwrap_or_default())
            .finish()
    }
}
