// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Compiled artifacts and the tensors passed to them.

use crate::DeviceError;
use memory_manager::MemoryRegion;
use tensor_core::TensorDesc;

/// One bound input or output as seen by a device.
///
/// `length` is the number of meaningful bytes in `memory`; for outputs it is
/// the capacity the device may write.
#[derive(Debug, Clone)]
pub struct IoTensor {
    pub desc: TensorDesc,
    pub memory: MemoryRegion,
    pub length: usize,
}

/// What a device reports after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Actual dimensions of each output.
    pub output_dims: Vec<Vec<i64>>,
    /// `false` for every output whose buffer was too small for the result.
    pub buffer_sufficient: Vec<bool>,
}

/// Per-input dimension bounds accepted by a compiled artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimRanges {
    pub min: Vec<Vec<u32>>,
    pub max: Vec<Vec<u32>>,
}

impl DimRanges {
    /// Checks `dims` of input `index` against the bounds. Inputs beyond the
    /// reported list are accepted.
    pub fn check(&self, index: usize, dims: &[i64]) -> Result<(), String> {
        let (Some(min), Some(max)) = (self.min.get(index), self.max.get(index)) else {
            return Ok(());
        };
        if dims.len() != min.len() || dims.len() != max.len() {
            return Err(format!(
                "input {index} has rank {}, compiled rank is {}",
                dims.len(),
                min.len()
            ));
        }
        for (axis, &dim) in dims.iter().enumerate() {
            if dim < i64::from(min[axis]) || dim > i64::from(max[axis]) {
                return Err(format!(
                    "input {index} axis {axis}: {dim} outside [{}, {}]",
                    min[axis], max[axis]
                ));
            }
        }
        Ok(())
    }
}

/// A device-specific compiled graph.
///
/// Owned by exactly one execution plan and destroyed with it.
pub trait PreparedModel: Send + Sync {
    /// Serialises the artifact into opaque cache chunks.
    fn export_cache(&self) -> Result<Vec<Vec<u8>>, DeviceError>;

    /// Reports the accepted input dimension ranges.
    fn input_dim_ranges(&self) -> Result<DimRanges, DeviceError> {
        Err(DeviceError::NotSupported("input_dim_ranges".into()))
    }

    /// Executes the artifact once. Results are written into the output
    /// memories in place.
    fn run(&self, inputs: &[IoTensor], outputs: &[IoTensor]) -> Result<RunOutcome, DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dim_ranges_check() {
        let ranges = DimRanges {
            min: vec![vec![1, 3]],
            max: vec![vec![8, 3]],
        };
        assert!(ranges.check(0, &[4, 3]).is_ok());
        assert!(ranges.check(0, &[9, 3]).is_err());
        assert!(ranges.check(0, &[4]).is_err());
        assert!(ranges.check(1, &[100]).is_ok());
    }
}
