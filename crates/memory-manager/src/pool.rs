// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Budgeted pool of host-visible device memory.
//!
//! The [`MemoryPool`] backs in-process devices. It:
//!
//! 1. Enforces a hard memory ceiling: allocations that would exceed the
//!    budget return `Err(OutOfMemory)`.
//! 2. Records every live region by id, so a release of a region that is not
//!    live (double release, or a region from another pool) is reported
//!    instead of silently corrupting the byte count.
//! 3. Recycles released storage through a free list binned by size class.
//!
//! # Thread Safety
//! All state sits behind one `Mutex`; the pool is `Send + Sync` and is
//! usually shared as `Arc<MemoryPool>` by a device.

use crate::{AllocationStats, MemoryBudget, MemoryError, MemoryRegion};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Minimum size class: 4 KB. Anything smaller is rounded up.
const MIN_SIZE_CLASS: usize = 4096;

struct PoolState {
    next_id: u64,
    live: HashMap<u64, MemoryRegion>,
    allocated_bytes: usize,
    /// size_class → recycled storage.
    free_buffers: HashMap<usize, Vec<Vec<u8>>>,
    free_list_bytes: usize,
    stats: AllocationStats,
}

/// Allocator for device memory regions.
///
/// # Example
/// ```
/// use memory_manager::{MemoryBudget, MemoryPool};
///
/// let pool = MemoryPool::new(MemoryBudget::from_mb(1));
/// let r = pool.allocate(64).unwrap();
/// assert_eq!(pool.live_regions(), 1);
/// pool.release(&r).unwrap();
/// assert_eq!(pool.live_regions(), 0);
/// ```
pub struct MemoryPool {
    budget: MemoryBudget,
    state: Mutex<PoolState>,
}

impl MemoryPool {
    /// Creates a new memory pool with the given budget.
    pub fn new(budget: MemoryBudget) -> Self {
        Self {
            budget,
            state: Mutex::new(PoolState {
                next_id: 1,
                live: HashMap::new(),
                allocated_bytes: 0,
                free_buffers: HashMap::new(),
                free_list_bytes: 0,
                stats: AllocationStats::default(),
            }),
        }
    }

    /// Allocates a zeroed region of exactly `size_bytes`.
    ///
    /// Storage of the matching size class is reused from the free list when
    /// available.
    pub fn allocate(&self, size_bytes: usize) -> Result<MemoryRegion, MemoryError> {
        if size_bytes == 0 {
            return Err(MemoryError::ZeroSizedAllocation);
        }

        let mut state = self.lock();
        let budget = self.budget.as_bytes();
        let fits = state
            .allocated_bytes
            .checked_add(size_bytes)
            .is_some_and(|total| total <= budget);
        if !fits {
            state.stats.record_refusal();
            return Err(self.out_of_memory(&state, size_bytes));
        }

        let size_class = size_class_for(size_bytes);
        let recycled = state
            .free_buffers
            .get_mut(&size_class)
            .and_then(|bin| bin.pop());

        let storage = match recycled {
            Some(mut buf) => {
                state.free_list_bytes -= buf.capacity().min(state.free_list_bytes);
                buf.clear();
                buf.resize(size_bytes, 0);
                state.stats.record_allocation(size_bytes, true);
                buf
            }
            None => {
                let mut buf = Vec::new();
                if buf.try_reserve_exact(size_class).is_err() {
                    state.stats.record_refusal();
                    return Err(self.out_of_memory(&state, size_bytes));
                }
                buf.resize(size_bytes, 0);
                state.stats.record_allocation(size_bytes, false);
                buf
            }
        };

        let id = state.next_id;
        state.next_id += 1;
        let region = MemoryRegion::from_vec(id, storage);
        state.live.insert(id, region.clone());
        state.allocated_bytes += size_bytes;
        let current = state.allocated_bytes;
        state.stats.observe_usage(current);

        tracing::trace!("pool: allocated region {id} ({size_bytes} bytes)");
        Ok(region)
    }

    /// Releases a live region. Every clone of the handle becomes unusable.
    ///
    /// Returns `Err(UnknownRegion)` if the region is not live in this pool.
    pub fn release(&self, region: &MemoryRegion) -> Result<(), MemoryError> {
        let mut state = self.lock();
        let is_ours = state
            .live
            .get(&region.id())
            .is_some_and(|live| live.same_region(region));
        if !is_ours {
            state.stats.record_invalid_release();
            return Err(MemoryError::UnknownRegion(region.id()));
        }

        state.live.remove(&region.id());
        state.allocated_bytes -= region.len();
        state.stats.record_release();

        let storage = region.take_storage();
        state.free_list_bytes += storage.capacity();
        state
            .free_buffers
            .entry(size_class_for(region.len()))
            .or_default()
            .push(storage);

        tracing::trace!("pool: released region {}", region.id());
        Ok(())
    }

    /// Returns `true` if `region` is currently live in this pool.
    pub fn is_live(&self, region: &MemoryRegion) -> bool {
        self.lock()
            .live
            .get(&region.id())
            .is_some_and(|live| live.same_region(region))
    }

    /// Returns the number of regions allocated and not yet released.
    pub fn live_regions(&self) -> usize {
        self.lock().live.len()
    }

    /// Returns the number of bytes currently allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.lock().allocated_bytes
    }

    /// Returns the number of bytes remaining before hitting the budget.
    pub fn available_bytes(&self) -> usize {
        self.budget.as_bytes().saturating_sub(self.allocated_bytes())
    }

    /// Returns the memory budget.
    pub fn budget(&self) -> MemoryBudget {
        self.budget
    }

    /// Returns a snapshot of allocation statistics.
    pub fn stats(&self) -> AllocationStats {
        self.lock().stats.clone()
    }

    /// Returns the approximate number of bytes held in the free list.
    pub fn free_list_bytes(&self) -> usize {
        self.lock().free_list_bytes
    }

    fn out_of_memory(&self, state: &PoolState, requested_bytes: usize) -> MemoryError {
        let budget = self.budget.as_bytes();
        MemoryError::OutOfMemory {
            requested_bytes,
            available_bytes: budget.saturating_sub(state.allocated_bytes),
            budget_bytes: budget,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Computes the size class for a given allocation size.
///
/// Returns the smallest power of 2 that is ≥ `size` and ≥ `MIN_SIZE_CLASS`,
/// or `size` itself when no such power fits in `usize`.
fn size_class_for(size: usize) -> usize {
    let size = size.max(MIN_SIZE_CLASS);
    size.checked_next_power_of_two().unwrap_or(size)
}

impl std::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("budget", &self.budget)
            .field("allocated_bytes", &self.allocated_bytes())
            .field("live_regions", &self.live_regions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_release() {
        let pool = MemoryPool::new(MemoryBudget::from_mb(1));

        let r = pool.allocate(1024).unwrap();
        assert_eq!(pool.allocated_bytes(), 1024);
        assert_eq!(r.len(), 1024);
        assert!(pool.is_live(&r));

        pool.release(&r).unwrap();
        assert_eq!(pool.allocated_bytes(), 0);
        assert!(!pool.is_live(&r));
    }

    #[test]
    fn test_double_release_detected() {
        let pool = MemoryPool::new(MemoryBudget::from_mb(1));
        let r = pool.allocate(16).unwrap();
        pool.release(&r).unwrap();

        assert!(matches!(pool.release(&r), Err(MemoryError::UnknownRegion(_))));
        assert_eq!(pool.allocated_bytes(), 0);
        assert_eq!(pool.stats().invalid_releases, 1);
        assert_eq!(pool.stats().releases, 1);
    }

    #[test]
    fn test_foreign_region_rejected() {
        let a = MemoryPool::new(MemoryBudget::from_mb(1));
        let b = MemoryPool::new(MemoryBudget::from_mb(1));
        let ra = a.allocate(8).unwrap();
        let _rb = b.allocate(8).unwrap();
        // Same id (1) in both pools, but not the same region.
        assert!(b.release(&ra).is_err());
        assert!(a.is_live(&ra));
    }

    #[test]
    fn test_oom() {
        let pool = MemoryPool::new(MemoryBudget::from_bytes(1024));
        let _r1 = pool.allocate(512).unwrap();
        let _r2 = pool.allocate(512).unwrap();
        assert!(matches!(pool.allocate(1), Err(MemoryError::OutOfMemory { .. })));
        assert_eq!(pool.stats().refused, 1);
    }

    #[test]
    fn test_huge_request_refused_without_overflow() {
        let pool = MemoryPool::new(MemoryBudget::from_mb(1));
        let live = pool.allocate(8).unwrap();
        for len in [usize::MAX, usize::MAX - 4, usize::MAX / 2 + 1] {
            assert!(matches!(
                pool.allocate(len),
                Err(MemoryError::OutOfMemory { requested_bytes, .. }) if requested_bytes == len
            ));
        }
        assert_eq!(pool.stats().refused, 3);
        assert_eq!(pool.allocated_bytes(), 8);
        pool.release(&live).unwrap();
    }

    #[test]
    fn test_unreservable_class_refused() {
        let pool = MemoryPool::new(MemoryBudget::from_bytes(usize::MAX));
        let len = usize::MAX / 2 + 1;
        assert!(matches!(pool.allocate(len), Err(MemoryError::OutOfMemory { .. })));
        assert_eq!(pool.stats().refused, 1);
        assert_eq!(pool.live_regions(), 0);
    }

    #[test]
    fn test_read_racing_release_never_panics() {
        let pool = std::sync::Arc::new(MemoryPool::new(MemoryBudget::from_mb(1)));
        for _ in 0..2_000 {
            let region = pool.allocate(64).unwrap();
            let releaser = {
                let pool = std::sync::Arc::clone(&pool);
                let region = region.clone();
                std::thread::spawn(move || pool.release(&region))
            };
            let mut buf = [0u8; 64];
            loop {
                match region.read(0, &mut buf) {
                    Ok(()) => assert_eq!(buf, [0u8; 64]),
                    Err(MemoryError::Released(_)) => break,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            releaser.join().unwrap().unwrap();
        }
        assert_eq!(pool.live_regions(), 0);
        assert_eq!(pool.stats().invalid_releases, 0);
    }

    #[test]
    fn test_zero_allocation() {
        let pool = MemoryPool::new(MemoryBudget::from_mb(1));
        assert!(matches!(pool.allocate(0), Err(MemoryError::ZeroSizedAllocation)));
    }

    #[test]
    fn test_free_list_reuse_is_zeroed() {
        let pool = MemoryPool::new(MemoryBudget::from_mb(1));

        let r = pool.allocate(4096).unwrap();
        r.with_bytes_mut(|d| d.fill(0xFF)).unwrap();
        pool.release(&r).unwrap();
        assert!(pool.free_list_bytes() > 0);

        let r2 = pool.allocate(3000).unwrap();
        assert_eq!(r2.len(), 3000);
        assert!(r2.with_bytes(|d| d.iter().all(|&b| b == 0)).unwrap());

        let stats = pool.stats();
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.allocations, 2);
    }

    #[test]
    fn test_ids_unique() {
        let pool = MemoryPool::new(MemoryBudget::from_mb(1));
        let a = pool.allocate(8).unwrap();
        pool.release(&a).unwrap();
        let b = pool.allocate(8).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_stats_peak() {
        let pool = MemoryPool::new(MemoryBudget::from_mb(1));
        let r1 = pool.allocate(1000).unwrap();
        let r2 = pool.allocate(2000).unwrap();
        pool.release(&r1).unwrap();
        pool.release(&r2).unwrap();
        assert_eq!(pool.stats().peak_bytes, 3000);
    }

    #[test]
    fn test_size_class() {
        assert_eq!(size_class_for(1), MIN_SIZE_CLASS);
        assert_eq!(size_class_for(4096), 4096);
        assert_eq!(size_class_for(5000), 8192);
        assert_eq!(size_class_for(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_debug_format() {
        let pool = MemoryPool::new(MemoryBudget::from_mb(64));
        let debug = format!("{pool:?}");
        assert!(debug.contains("MemoryPool"));
        assert!(debug.contains("live_regions"));
    }
}
