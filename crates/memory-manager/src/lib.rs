// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-manager
//!
//! Device memory as seen from the host: every buffer a device hands out is a
//! [`MemoryRegion`], a cheap cloneable handle over a host-visible byte region.
//!
//! # Key Components
//!
//! - [`MemoryBudget`]: a hard memory ceiling with human-readable parsing
//!   (`"512M"`, `"1G"`, etc.).
//! - [`MemoryPool`]: the allocator used by in-process devices. It enforces the
//!   budget, recycles released regions through a size-class free list and
//!   keeps a table of live regions so that a second release of the same
//!   region is detected instead of corrupting the accounting.
//! - [`MemoryRegion`]: the handle itself. Cloning a handle never duplicates
//!   the memory; releasing it is an explicit call on the owning device.
//! - [`AllocationStats`]: cumulative allocator metrics.
//!
//! # Ownership Model
//!
//! ```text
//! MemoryPool::allocate(len) ──► MemoryRegion (live table + caller)
//!                                   │
//!                                   │ MemoryPool::release(&region)
//!                                   ▼
//!                     live table entry removed ──► free list
//!                     region marked released (reads/writes now fail)
//! ```
//!
//! # Example
//! ```
//! use memory_manager::{MemoryBudget, MemoryPool};
//!
//! let pool = MemoryPool::new(MemoryBudget::from_mb(64));
//! let region = pool.allocate(1024).unwrap();
//! region.write(0, &[1, 2, 3]).unwrap();
//! assert_eq!(pool.allocated_bytes(), 1024);
//!
//! pool.release(&region).unwrap();
//! assert_eq!(pool.allocated_bytes(), 0);
//! assert!(pool.release(&region).is_err()); // double release is caught
//! ```

mod budget;
mod error;
pub mod pool;
mod region;
mod stats;

pub use budget::MemoryBudget;
pub use error::MemoryError;
pub use pool::MemoryPool;
pub use region::MemoryRegion;
pub use stats::AllocationStats;
