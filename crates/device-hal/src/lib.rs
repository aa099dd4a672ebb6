// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # device-hal
//!
//! The boundary between the runtime core and the silicon it drives.
//!
//! # Key Components
//!
//! - [`Device`]: capability queries, compilation and device-memory
//!   management, implemented by every back-end.
//! - [`PreparedModel`]: an opaque compiled artifact owned by one plan.
//! - [`DeviceManager`]: the registry that assigns each device a stable id
//!   derived from its name and vendor.
//! - [`ReferenceDevice`]: an in-process back-end running f32 elementwise
//!   graphs on the host.
//! - [`DriverDevice`]: a back-end that forwards every call through a
//!   [`DriverConnection`].
//!
//! # Example
//! ```
//! use device_hal::{DeviceManager, ReferenceOptions};
//!
//! let manager = DeviceManager::new();
//! let id = manager.init(ReferenceOptions::default()).unwrap();
//! let device = manager.get_device(id).unwrap();
//! assert!(device.is_model_cache_supported().unwrap());
//! ```

mod config;
mod device;
pub mod driver;
mod error;
mod info;
mod manager;
mod prepared_model;
pub mod reference;

pub use config::ModelConfig;
pub use device::Device;
pub use driver::{DriverCode, DriverConnection, DriverDevice};
pub use error::DeviceError;
pub use info::{Capabilities, Capability, DeviceStatus, DeviceType, PerformanceMode, Priority};
pub use manager::{device_id, DeviceManager};
pub use prepared_model::{DimRanges, IoTensor, PreparedModel, RunOutcome};
pub use reference::{ReferenceDevice, ReferenceOptions};
