// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Back-end reached through a versioned driver ABI.
//!
//! The runtime never talks to a driver directly. It goes through a
//! [`DriverConnection`], a blocking call primitive whose implementation owns
//! transport and marshalling. [`DriverDevice`] sits on top of it and maps
//! driver status codes into [`DeviceError`].

mod device;
mod model;

pub use device::DriverDevice;
pub use model::DriverPreparedModel;

use crate::{
    Capability, DeviceError, DeviceStatus, DeviceType, DimRanges, IoTensor, ModelConfig,
    RunOutcome,
};
use memory_manager::MemoryRegion;
use model_ir::{graph::Validated, ModelGraph};
use std::fmt;

/// ABI major versions this runtime can drive.
pub const SUPPORTED_ABI_MAJORS: [u32; 2] = [1, 2];

/// Non-success status returned by a driver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCode {
    Failure,
    NotSupported,
    InvalidParam,
    NoMemory,
    Other(i32),
}

impl DriverCode {
    /// Maps a raw driver status. `0` is success and maps to `None`.
    pub fn from_raw(code: i32) -> Option<Self> {
        match code {
            0 => None,
            -1 => Some(Self::Failure),
            -2 => Some(Self::NotSupported),
            -3 => Some(Self::InvalidParam),
            -6 => Some(Self::NoMemory),
            other => Some(Self::Other(other)),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Self::Failure => -1,
            Self::NotSupported => -2,
            Self::InvalidParam => -3,
            Self::NoMemory => -6,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for DriverCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failure => write!(f, "failure"),
            Self::NotSupported => write!(f, "not supported"),
            Self::InvalidParam => write!(f, "invalid parameter"),
            Self::NoMemory => write!(f, "out of memory"),
            Self::Other(code) => write!(f, "status {code}"),
        }
    }
}

pub type DriverResult<T> = Result<T, DriverCode>;

/// Handle of a model compiled inside the driver. Zero is never valid.
pub type ModelHandle = u64;

/// Blocking call surface of one driver instance.
pub trait DriverConnection: Send + Sync {
    /// Returns the `(major, minor)` ABI version the driver speaks.
    fn abi_version(&self) -> DriverResult<(u32, u32)>;

    fn device_name(&self) -> DriverResult<String>;

    fn vendor_name(&self) -> DriverResult<String>;

    fn device_type(&self) -> DriverResult<DeviceType>;

    fn device_status(&self) -> DriverResult<DeviceStatus>;

    fn supported_operations(&self, graph: &ModelGraph<Validated>) -> DriverResult<Vec<bool>>;

    fn capability(&self, capability: Capability) -> DriverResult<bool>;

    fn prepare_model(
        &self,
        graph: &ModelGraph<Validated>,
        config: &ModelConfig,
    ) -> DriverResult<ModelHandle>;

    fn prepare_model_from_cache(
        &self,
        chunks: &[&[u8]],
        config: &ModelConfig,
    ) -> DriverResult<ModelHandle>;

    fn export_model_cache(&self, model: ModelHandle) -> DriverResult<Vec<Vec<u8>>>;

    fn input_dim_ranges(&self, model: ModelHandle) -> DriverResult<DimRanges>;

    fn run(
        &self,
        model: ModelHandle,
        inputs: &[IoTensor],
        outputs: &[IoTensor],
    ) -> DriverResult<RunOutcome>;

    fn release_model(&self, model: ModelHandle) -> DriverResult<()>;

    fn allocate_buffer(&self, len: usize) -> DriverResult<MemoryRegion>;

    fn release_buffer(&self, region: &MemoryRegion) -> DriverResult<()>;
}

/// Translates a failed compile/run/buffer call.
pub(crate) fn translate(code: DriverCode, call: &'static str) -> DeviceError {
    match code {
        DriverCode::NotSupported => DeviceError::NotSupported(call.to_string()),
        DriverCode::InvalidParam => {
            DeviceError::InvalidParameter(format!("driver rejected {call}"))
        }
        DriverCode::NoMemory => DeviceError::DriverOutOfMemory { call },
        other => DeviceError::Failed(format!("{call}: driver returned {other}")),
    }
}

/// Translates a failed metadata or capability query.
pub(crate) fn unavailable(code: DriverCode, call: &'static str) -> DeviceError {
    DeviceError::Unavailable(format!("{call}: driver returned {code}"))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_codes() {
        assert_eq!(DriverCode::from_raw(0), None);
        assert_eq!(DriverCode::from_raw(-2), Some(DriverCode::NotSupported));
        assert_eq!(DriverCode::from_raw(-42), Some(DriverCode::Other(-42)));
        assert_eq!(DriverCode::NoMemory.as_raw(), -6);
    }

    #[test]
    fn test_translate() {
        assert!(translate(DriverCode::NotSupported, "run").is_not_supported());
        assert!(matches!(
            translate(DriverCode::InvalidParam, "run"),
            DeviceError::InvalidParameter(_)
        ));
        assert!(matches!(
            translate(DriverCode::NoMemory, "allocate_buffer"),
            DeviceError::DriverOutOfMemory { call: "allocate_buffer" }
        ));
        assert!(matches!(translate(DriverCode::Other(-9), "run"), DeviceError::Failed(_)));
        assert!(matches!(
            unavailable(DriverCode::Failure, "device_name"),
            DeviceError::Unavailable(_)
        ));
    }
}
