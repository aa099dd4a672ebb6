// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Registry of the devices available to this process.
//!
//! A [`DeviceManager`] is an ordinary value: build one with
//! [`DeviceManager::new`], populate it with [`init`](DeviceManager::init)
//! and/or [`discover`](DeviceManager::discover), and share it behind an
//! `Arc`. Tests build isolated registries the same way.

use crate::driver::{DriverConnection, DriverDevice};
use crate::reference::{ReferenceDevice, ReferenceOptions};
use crate::{Device, DeviceError};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Computes the stable identifier of a device from its name and vendor.
///
/// The id is the first eight bytes (little-endian) of the BLAKE3 digest of
/// `name`, a NUL byte and `vendor`, so it survives process restarts and can be
/// written into cache manifests.
pub fn device_id(name: &str, vendor: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(&[0]);
    hasher.update(vendor.as_bytes());
    let digest = hasher.finalize();
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(word)
}

struct Entry {
    name: String,
    device: Arc<dyn Device>,
}

/// Thread-safe device registry keyed by [`device_id`].
#[derive(Default)]
pub struct DeviceManager {
    devices: Mutex<BTreeMap<u64, Entry>>,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the built-in reference device and returns its id.
    pub fn init(&self, options: ReferenceOptions) -> Result<u64, DeviceError> {
        self.register(|| Some(Arc::new(ReferenceDevice::new(options)) as Arc<dyn Device>))
    }

    /// Registers one [`DriverDevice`] per connection. Connections that fail
    /// the handshake or registration are logged and skipped.
    pub fn discover(&self, connections: Vec<Arc<dyn DriverConnection>>) -> Vec<u64> {
        let mut ids = Vec::with_capacity(connections.len());
        for conn in connections {
            let device = match DriverDevice::connect(conn) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("driver discovery: skipping connection: {e}");
                    continue;
                }
            };
            match self.register(|| Some(Arc::new(device) as Arc<dyn Device>)) {
                Ok(id) => ids.push(id),
                Err(e) => tracing::warn!("driver discovery: registration failed: {e}"),
            }
        }
        ids
    }

    /// Builds a device with `creator` and inserts it into the registry.
    ///
    /// # Errors
    /// - `InvalidParameter` if `creator` yields no device.
    /// - `Unavailable` if the name or vendor query fails, the name is empty,
    ///   or the registry's only device already uses this name under a
    ///   different id.
    ///
    /// Registering an id that is already present replaces the old entry.
    pub fn register<F>(&self, creator: F) -> Result<u64, DeviceError>
    where
        F: FnOnce() -> Option<Arc<dyn Device>>,
    {
        let device = creator().ok_or_else(|| {
            DeviceError::InvalidParameter("device creator returned no device".into())
        })?;

        let name = device
            .name()
            .map_err(|e| DeviceError::Unavailable(format!("device name query failed: {e}")))?;
        let vendor = device
            .vendor()
            .map_err(|e| DeviceError::Unavailable(format!("device vendor query failed: {e}")))?;
        if name.is_empty() {
            return Err(DeviceError::Unavailable("device reported an empty name".into()));
        }

        let id = device_id(&name, &vendor);
        let mut devices = self.lock();

        if devices.len() == 1 {
            if let Some((&existing_id, existing)) = devices.iter().next() {
                if existing.name == name && existing_id != id {
                    return Err(DeviceError::Unavailable(format!(
                        "device name '{name}' is already taken by device {existing_id}"
                    )));
                }
            }
        }

        if devices.contains_key(&id) {
            tracing::warn!("device '{name}' ({vendor}) registered twice, replacing id {id}");
        }
        devices.insert(id, Entry { name: name.clone(), device });
        tracing::info!("registered device '{name}' ({vendor}) as {id}");
        Ok(id)
    }

    /// Looks up a device by id.
    pub fn get_device(&self, id: u64) -> Option<Arc<dyn Device>> {
        self.lock().get(&id).map(|e| Arc::clone(&e.device))
    }

    /// Returns every registered id in ascending order.
    pub fn all_device_ids(&self) -> Vec<u64> {
        self.lock().keys().copied().collect()
    }

    /// Returns the registered name of `id`, or an empty string if unknown.
    pub fn get_device_name(&self, id: u64) -> String {
        self.lock().get(&id).map(|e| e.name.clone()).unwrap_or_default()
    }

    /// Returns the id of the first device named `name`.
    pub fn find_by_name(&self, name: &str) -> Option<u64> {
        self.lock()
            .iter()
            .find(|(_, e)| e.name == name)
            .map(|(&id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<u64, Entry>> {
        self.devices.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("devices", &self.all_device_ids())
            .finish()
    }
}
