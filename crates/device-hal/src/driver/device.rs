// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! [`Device`] implementation over a [`DriverConnection`].

use super::{
    translate, unavailable, DriverCode, DriverConnection, DriverPreparedModel,
    SUPPORTED_ABI_MAJORS,
};
use crate::{
    Capability, Device, DeviceError, DeviceStatus, DeviceType, ModelConfig, PreparedModel,
};
use memory_manager::MemoryRegion;
use model_ir::{graph::Validated, ModelGraph};
use std::sync::Arc;

/// A device whose every call is forwarded to a driver.
pub struct DriverDevice {
    conn: Arc<dyn DriverConnection>,
    abi: (u32, u32),
}

impl DriverDevice {
    /// Performs the version handshake.
    ///
    /// Fails with `Unavailable` if the version query fails or the driver
    /// speaks an ABI major version other than 1 or 2.
    pub fn connect(conn: Arc<dyn DriverConnection>) -> Result<Self, DeviceError> {
        let abi = conn
            .abi_version()
            .map_err(|c| unavailable(c, "abi_version"))?;
        if !SUPPORTED_ABI_MAJORS.contains(&abi.0) {
            return Err(DeviceError::Unavailable(format!(
                "driver ABI {}.{} is not supported",
                abi.0, abi.1
            )));
        }
        tracing::debug!("driver handshake ok, ABI {}.{}", abi.0, abi.1);
        Ok(Self { conn, abi })
    }

    /// The negotiated `(major, minor)` ABI version.
    pub fn abi_version(&self) -> (u32, u32) {
        self.abi
    }

    fn capability(&self, capability: Capability) -> Result<bool, DeviceError> {
        match self.conn.capability(capability) {
            Ok(supported) => Ok(supported),
            Err(DriverCode::NotSupported) => Ok(false),
            Err(code) => Err(unavailable(code, capability.as_str())),
        }
    }

    fn wrap(&self, handle: u64, call: &'static str) -> Result<Box<dyn PreparedModel>, DeviceError> {
        if handle == 0 {
            return Err(DeviceError::NullHandle(call));
        }
        Ok(Box::new(DriverPreparedModel::new(Arc::clone(&self.conn), handle)))
    }
}

impl Device for DriverDevice {
    fn name(&self) -> Result<String, DeviceError> {
        self.conn.device_name().map_err(|c| unavailable(c, "device_name"))
    }

    fn vendor(&self) -> Result<String, DeviceError> {
        self.conn.vendor_name().map_err(|c| unavailable(c, "vendor_name"))
    }

    fn device_type(&self) -> Result<DeviceType, DeviceError> {
        self.conn.device_type().map_err(|c| unavailable(c, "device_type"))
    }

    fn status(&self) -> Result<DeviceStatus, DeviceError> {
        self.conn.device_status().map_err(|c| unavailable(c, "device_status"))
    }

    fn supported_operations(
        &self,
        graph: &ModelGraph<Validated>,
    ) -> Result<Vec<bool>, DeviceError> {
        let flags = self
            .conn
            .supported_operations(graph)
            .map_err(|c| unavailable(c, "supported_operations"))?;
        if flags.len() != graph.num_nodes() {
            return Err(DeviceError::Failed(format!(
                "driver reported {} operation flags for {} nodes",
                flags.len(),
                graph.num_nodes()
            )));
        }
        Ok(flags)
    }

    fn is_fp16_supported(&self) -> Result<bool, DeviceError> {
        self.capability(Capability::Fp16)
    }

    fn is_performance_mode_supported(&self) -> Result<bool, DeviceError> {
        self.capability(Capability::PerformanceMode)
    }

    fn is_priority_supported(&self) -> Result<bool, DeviceError> {
        self.capability(Capability::Priority)
    }

    fn is_dynamic_input_supported(&self) -> Result<bool, DeviceError> {
        self.capability(Capability::DynamicInput)
    }

    fn is_model_cache_supported(&self) -> Result<bool, DeviceError> {
        self.capability(Capability::ModelCache)
    }

    fn prepare_model(
        &self,
        graph: &ModelGraph<Validated>,
        config: &ModelConfig,
    ) -> Result<Box<dyn PreparedModel>, DeviceError> {
        let handle = self
            .conn
            .prepare_model(graph, config)
            .map_err(|c| translate(c, "prepare_model"))?;
        self.wrap(handle, "prepare_model")
    }

    fn prepare_model_from_cache(
        &self,
        chunks: &[&[u8]],
        config: &ModelConfig,
    ) -> Result<Box<dyn PreparedModel>, DeviceError> {
        let handle = self
            .conn
            .prepare_model_from_cache(chunks, config)
            .map_err(|c| translate(c, "prepare_model_from_cache"))?;
        self.wrap(handle, "prepare_model_from_cache")
    }

    fn allocate_buffer(&self, len: usize) -> Result<MemoryRegion, DeviceError> {
        if len == 0 {
            return Err(DeviceError::InvalidParameter("cannot allocate 0 bytes".into()));
        }
        self.conn
            .allocate_buffer(len)
            .map_err(|c| translate(c, "allocate_buffer"))
    }

    fn release_buffer(&self, region: &MemoryRegion) -> Result<(), DeviceError> {
        self.conn
            .release_buffer(region)
            .map_err(|c| translate(c, "release_buffer"))
    }
}

impl std::fmt::Debug for DriverDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverDevice").field("abi", &self.abi).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::fake::FakeDriver;
    use super::*;
    use crate::DeviceManager;
    use model_ir::{Node, OpType};
    use tensor_core::{DType, Shape, TensorDesc};

    fn graph() -> ModelGraph<Validated> {
        let d = TensorDesc::new(DType::F32, Shape::new(vec![4]));
        ModelGraph::new(
            "relu".into(),
            vec![d.clone(), d],
            vec![Node::new("relu", OpType::Relu, vec![0], vec![1])],
            vec![0],
            vec![1],
        )
        .validate()
        .unwrap()
    }

    fn connect(driver: FakeDriver) -> (Arc<FakeDriver>, Result<DriverDevice, DeviceError>) {
        let driver = Arc::new(driver);
        let device = DriverDevice::connect(Arc::clone(&driver) as Arc<dyn DriverConnection>);
        (driver, device)
    }

    #[test]
    fn test_abi_handshake() {
        let (_, ok) = connect(FakeDriver::new());
        assert_eq!(ok.unwrap().abi_version(), (2, 0));

        let (_, err) = connect(FakeDriver { abi: (3, 1), ..FakeDriver::new() });
        assert!(matches!(err, Err(DeviceError::Unavailable(_))));
    }

    #[test]
    fn test_metadata_failures_are_unavailable() {
        let (_, device) = connect(FakeDriver::new());
        let device = device.unwrap();
        assert!(matches!(device.status(), Err(DeviceError::Unavailable(_))));
        assert_eq!(device.device_type().unwrap(), DeviceType::Accelerator);
    }

    #[test]
    fn test_capability_not_supported_is_false() {
        let (_, device) = connect(FakeDriver {
            capability_result: Some(Err(DriverCode::NotSupported)),
            ..FakeDriver::new()
        });
        assert!(!device.unwrap().is_fp16_supported().unwrap());

        let (_, device) = connect(FakeDriver {
            capability_result: Some(Err(DriverCode::Failure)),
            ..FakeDriver::new()
        });
        assert!(matches!(
            device.unwrap().is_model_cache_supported(),
            Err(DeviceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_zero_handle_is_null() {
        let (_, device) = connect(FakeDriver {
            prepare_result: Some(Ok(0)),
            ..FakeDriver::new()
        });
        let err = device.unwrap().prepare_model(&graph(), &ModelConfig::default());
        assert!(matches!(err, Err(DeviceError::NullHandle("prepare_model"))));
    }

    #[test]
    fn test_prepare_error_translation() {
        let (_, device) = connect(FakeDriver {
            prepare_result: Some(Err(DriverCode::NotSupported)),
            ..FakeDriver::new()
        });
        let err = device.unwrap().prepare_model(&graph(), &ModelConfig::default());
        assert!(matches!(err, Err(DeviceError::NotSupported(_))));
    }

    #[test]
    fn test_model_released_on_drop() {
        let (driver, device) = connect(FakeDriver::new());
        let device = device.unwrap();
        let model = device.prepare_model(&graph(), &ModelConfig::default()).unwrap();
        assert_eq!(driver.live_models.lock().unwrap().len(), 1);
        assert!(model.input_dim_ranges().unwrap_err().is_not_supported());

        drop(model);
        assert!(driver.live_models.lock().unwrap().is_empty());
        assert_eq!(*driver.released_models.lock().unwrap(), vec![7]);
    }

    #[test]
    fn test_release_failure_is_logged_not_panicking() {
        let (driver, device) = connect(FakeDriver {
            release_model_fails: true,
            ..FakeDriver::new()
        });
        let model = device.unwrap().prepare_model(&graph(), &ModelConfig::default()).unwrap();
        drop(model);
        assert_eq!(driver.released_models.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_buffers() {
        let (driver, device) = connect(FakeDriver::new());
        let device = device.unwrap();
        assert!(matches!(device.allocate_buffer(0), Err(DeviceError::InvalidParameter(_))));
        assert_eq!(driver.allocations.load(std::sync::atomic::Ordering::SeqCst), 0);

        assert!(matches!(
            device.allocate_buffer(1 << 21),
            Err(DeviceError::DriverOutOfMemory { .. })
        ));
        let buf = device.allocate_buffer(16).unwrap();
        device.release_buffer(&buf).unwrap();
    }

    #[test]
    fn test_discover() {
        let manager = DeviceManager::new();
        let good: Arc<dyn DriverConnection> = Arc::new(FakeDriver::new());
        let old_abi: Arc<dyn DriverConnection> =
            Arc::new(FakeDriver { abi: (0, 9), name: "old".into(), ..FakeDriver::new() });
        let broken: Arc<dyn DriverConnection> =
            Arc::new(FakeDriver { fail_name: true, name: "broken".into(), ..FakeDriver::new() });

        let ids = manager.discover(vec![good, old_abi, broken]);
        assert_eq!(ids.len(), 1);
        assert_eq!(manager.get_device_name(ids[0]), "fake-npu");
    }
}
