// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Host-visible handles over device memory.

use crate::MemoryError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

struct RegionInner {
    id: u64,
    len: usize,
    data: Mutex<Vec<u8>>,
    released: AtomicBool,
}

/// A handle to one device buffer.
///
/// Clones refer to the same memory. The handle does not free anything on
/// drop: the device that produced it must be asked to release it, and after
/// that every access through any clone fails with [`MemoryError::Released`].
#[derive(Clone)]
pub struct MemoryRegion {
    inner: Arc<RegionInner>,
}

impl MemoryRegion {
    /// Wraps an already-mapped buffer. Back-ends that obtain memory from a
    /// driver use this; in-process back-ends go through
    /// [`MemoryPool`](crate::MemoryPool).
    pub fn from_vec(id: u64, data: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(RegionInner {
                id,
                len: data.len(),
                data: Mutex::new(data),
                released: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the identifier assigned by the allocating device.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Returns the region capacity in bytes.
    pub fn len(&self) -> usize {
        self.inner.len
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Returns `true` once the owning device has released the region.
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Returns `true` if both handles refer to the same memory.
    pub fn same_region(&self, other: &MemoryRegion) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Copies `src` into the region starting at `offset`.
    pub fn write(&self, offset: usize, src: &[u8]) -> Result<(), MemoryError> {
        let mut data = self.lock_live()?;
        let range = self.checked_range(offset, src.len())?;
        data[range].copy_from_slice(src);
        Ok(())
    }

    /// Copies bytes starting at `offset` into `dst`.
    pub fn read(&self, offset: usize, dst: &mut [u8]) -> Result<(), MemoryError> {
        let data = self.lock_live()?;
        let range = self.checked_range(offset, dst.len())?;
        dst.copy_from_slice(&data[range]);
        Ok(())
    }

    /// Runs `f` over the whole region.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, MemoryError> {
        let data = self.lock_live()?;
        Ok(f(&data))
    }

    /// Runs `f` over the whole region, mutably.
    pub fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R, MemoryError> {
        let mut data = self.lock_live()?;
        Ok(f(&mut data))
    }

    /// Marks the region released and hands back its storage for recycling.
    ///
    /// The flag flips while the data lock is held, so an access that already
    /// holds the lock finishes on intact storage and every later one fails.
    pub(crate) fn take_storage(&self) -> Vec<u8> {
        let mut data = lock(&self.inner.data);
        self.inner.released.store(true, Ordering::Release);
        std::mem::take(&mut *data)
    }

    fn lock_live(&self) -> Result<MutexGuard<'_, Vec<u8>>, MemoryError> {
        let data = lock(&self.inner.data);
        if self.is_released() || data.len() != self.inner.len {
            return Err(MemoryError::Released(self.inner.id));
        }
        Ok(data)
    }

    fn checked_range(
        &self,
        offset: usize,
        len: usize,
    ) -> Result<std::ops::Range<usize>, MemoryError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.inner.len => Ok(offset..end),
            _ => Err(MemoryError::OutOfBounds {
                offset,
                len,
                capacity: self.inner.len,
            }),
        }
    }
}

fn lock(data: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl std::fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("id", &self.inner.id)
            .field("len", &self.inner.len)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read() {
        let r = MemoryRegion::from_vec(1, vec![0; 8]);
        r.write(2, &[7, 8, 9]).unwrap();
        let mut out = [0u8; 4];
        r.read(1, &mut out).unwrap();
        assert_eq!(out, [0, 7, 8, 9]);
    }

    #[test]
    fn test_out_of_bounds() {
        let r = MemoryRegion::from_vec(1, vec![0; 4]);
        assert!(matches!(
            r.write(2, &[1, 2, 3]),
            Err(MemoryError::OutOfBounds { offset: 2, len: 3, capacity: 4 })
        ));
        assert!(r.write(usize::MAX, &[1]).is_err());
    }

    #[test]
    fn test_clones_share_memory() {
        let a = MemoryRegion::from_vec(3, vec![0; 4]);
        let b = a.clone();
        a.write(0, &[42]).unwrap();
        assert_eq!(b.with_bytes(|d| d[0]).unwrap(), 42);
        assert!(a.same_region(&b));
        assert!(!a.same_region(&MemoryRegion::from_vec(3, vec![0; 4])));
    }

    #[test]
    fn test_access_after_release() {
        let a = MemoryRegion::from_vec(5, vec![1; 4]);
        let b = a.clone();
        let storage = a.take_storage();
        assert_eq!(storage, vec![1; 4]);
        assert!(b.is_released());
        assert!(matches!(b.read(0, &mut [0u8; 1]), Err(MemoryError::Released(5))));
        assert_eq!(b.len(), 4);
    }
}
