// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Ownership-tagged tensor buffers.
//!
//! ```text
//! Backing::Owned(DeviceBuffer)   runtime allocated, released on drop
//! Backing::Shared(MemoryRegion)  caller registered, never released here
//! host: Option<&mut [u8]>        caller output slice, filled after run
//! ```
//!
//! Replacing a slot is one assignment; the previous `DeviceBuffer` is
//! dropped and therefore released exactly once.

use crate::RuntimeError;
use device_hal::{Device, IoTensor};
use memory_manager::MemoryRegion;
use std::sync::Arc;
use tensor_core::TensorDesc;

/// RAII handle to device memory owned by the runtime.
pub(crate) struct DeviceBuffer {
    memory: MemoryRegion,
    device: Arc<dyn Device>,
}

impl DeviceBuffer {
    pub(crate) fn allocate(device: &Arc<dyn Device>, len: usize) -> Result<Self, RuntimeError> {
        let memory = device.allocate_buffer(len)?;
        Ok(Self {
            memory,
            device: Arc::clone(device),
        })
    }

    pub(crate) fn memory(&self) -> &MemoryRegion {
        &self.memory
    }

    pub(crate) fn capacity(&self) -> usize {
        self.memory.len()
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        if let Err(e) = self.device.release_buffer(&self.memory) {
            tracing::error!("failed to release device buffer {}: {e}", self.memory.id());
        }
    }
}

impl std::fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer").field("memory", &self.memory).finish()
    }
}

#[derive(Debug)]
pub(crate) enum Backing {
    Owned(DeviceBuffer),
    Shared(MemoryRegion),
}

impl Backing {
    pub(crate) fn memory(&self) -> &MemoryRegion {
        match self {
            Self::Owned(buf) => buf.memory(),
            Self::Shared(region) => region,
        }
    }

    /// Capacity of the runtime-owned buffer, `None` for shared memory.
    pub(crate) fn owned_capacity(&self) -> Option<usize> {
        match self {
            Self::Owned(buf) => Some(buf.capacity()),
            Self::Shared(_) => None,
        }
    }
}

/// One bound input or output slot of an executor.
#[derive(Debug)]
pub(crate) struct TensorBuffer<'a> {
    pub(crate) desc: TensorDesc,
    pub(crate) backing: Backing,
    pub(crate) length: usize,
    pub(crate) host: Option<&'a mut [u8]>,
}

impl<'a> TensorBuffer<'a> {
    pub(crate) fn owned(desc: TensorDesc, buffer: DeviceBuffer, length: usize) -> Self {
        Self {
            desc,
            backing: Backing::Owned(buffer),
            length,
            host: None,
        }
    }

    pub(crate) fn shared(desc: TensorDesc, region: MemoryRegion) -> Self {
        let length = region.len();
        Self {
            desc,
            backing: Backing::Shared(region),
            length,
            host: None,
        }
    }

    pub(crate) fn uses_region(&self, region: &MemoryRegion) -> bool {
        matches!(&self.backing, Backing::Shared(r) if r.same_region(region))
    }

    pub(crate) fn io_tensor(&self) -> IoTensor {
        IoTensor {
            desc: self.desc.clone(),
            memory: self.backing.memory().clone(),
            length: self.length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_hal::ReferenceDevice;
    use tensor_core::{DType, Shape};

    #[test]
    fn test_owned_released_on_drop() {
        let reference = Arc::new(ReferenceDevice::default());
        let device: Arc<dyn Device> = reference.clone();

        let buf = DeviceBuffer::allocate(&device, 32).unwrap();
        assert_eq!(reference.live_buffers(), 1);
        let slot = TensorBuffer::owned(TensorDesc::new(DType::U8, Shape::new(vec![32])), buf, 32);
        assert_eq!(slot.backing.owned_capacity(), Some(32));

        drop(slot);
        assert_eq!(reference.live_buffers(), 0);
        assert_eq!(reference.memory_stats().invalid_releases, 0);
    }

    #[test]
    fn test_shared_never_released() {
        let reference = Arc::new(ReferenceDevice::default());
        let region = reference.allocate_buffer(16).unwrap();
        let slot =
            TensorBuffer::shared(TensorDesc::new(DType::U8, Shape::new(vec![16])), region.clone());
        assert!(slot.uses_region(&region));
        assert_eq!(slot.io_tensor().length, 16);

        drop(slot);
        assert_eq!(reference.live_buffers(), 1);
    }
}
