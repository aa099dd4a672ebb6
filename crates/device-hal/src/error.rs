// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for device back-ends.

/// Errors reported by a [`Device`](crate::Device) or a
/// [`PreparedModel`](crate::PreparedModel).
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// An argument was rejected (bad length, bad graph, bad configuration).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The back-end does not implement the requested call.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The device could not be reached or its metadata query failed.
    #[error("device unavailable: {0}")]
    Unavailable(String),

    /// In-process device memory failure.
    #[error("device memory error: {0}")]
    Memory(#[from] memory_manager::MemoryError),

    /// The driver reported that it ran out of memory during `call`.
    #[error("driver out of memory during {call}")]
    DriverOutOfMemory { call: &'static str },

    /// A dependency returned an empty handle where one was required.
    #[error("null handle returned by {0}")]
    NullHandle(&'static str),

    /// Generic failure reported by the back-end.
    #[error("device operation failed: {0}")]
    Failed(String),
}

impl DeviceError {
    /// Returns `true` for the "not implemented" outcome, which callers may
    /// treat as an absent optional feature rather than a failure.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }
}
