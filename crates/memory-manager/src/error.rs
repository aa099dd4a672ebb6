// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for device memory management.

/// Errors that can occur during allocation, release and region access.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// The requested allocation would exceed the memory budget.
    #[error("out of memory: requested {requested_bytes} bytes, but only {available_bytes} available (budget: {budget_bytes})")]
    OutOfMemory {
        requested_bytes: usize,
        available_bytes: usize,
        budget_bytes: usize,
    },

    /// Attempted to allocate a zero-sized buffer.
    #[error("cannot allocate zero-sized buffer")]
    ZeroSizedAllocation,

    /// The region is not live in this pool (never allocated here, or
    /// already released).
    #[error("region {0} is not live in this pool")]
    UnknownRegion(u64),

    /// The region was accessed after being released.
    #[error("region {0} has been released")]
    Released(u64),

    /// A read or write fell outside the region.
    #[error("access of {len} bytes at offset {offset} exceeds region of {capacity} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// A budget string could not be parsed.
    #[error("invalid memory budget '{0}': expected a positive number with an optional K/M/G suffix")]
    InvalidBudget(String),
}
