// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Artifacts compiled inside a driver.

use super::{translate, DriverConnection, ModelHandle};
use crate::{DeviceError, DimRanges, IoTensor, PreparedModel, RunOutcome};
use std::sync::Arc;

/// A driver-side compiled model. The driver handle is released on drop.
pub struct DriverPreparedModel {
    conn: Arc<dyn DriverConnection>,
    handle: ModelHandle,
}

impl DriverPreparedModel {
    pub(crate) fn new(conn: Arc<dyn DriverConnection>, handle: ModelHandle) -> Self {
        Self { conn, handle }
    }

    pub fn handle(&self) -> ModelHandle {
        self.handle
    }
}

impl PreparedModel for DriverPreparedModel {
    fn export_cache(&self) -> Result<Vec<Vec<u8>>, DeviceError> {
        self.conn
            .export_model_cache(self.handle)
            .map_err(|c| translate(c, "export_model_cache"))
    }

    fn input_dim_ranges(&self) -> Result<DimRanges, DeviceError> {
        self.conn
            .input_dim_ranges(self.handle)
            .map_err(|c| translate(c, "input_dim_ranges"))
    }

    fn run(&self, inputs: &[IoTensor], outputs: &[IoTensor]) -> Result<RunOutcome, DeviceError> {
        self.conn
            .run(self.handle, inputs, outputs)
            .map_err(|c| translate(c, "run"))
    }
}

impl Drop for DriverPreparedModel {
    fn drop(&mut self) {
        if let Err(code) = self.conn.release_model(self.handle) {
            tracing::error!("failed to release driver model {}: {code}", self.handle);
        }
    }
}

impl std::fmt::Debug for DriverPreparedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverPreparedModel")
            .field("handle", &self.handle)
            .finish()
    }
}
