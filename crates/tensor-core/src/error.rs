// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor descriptors.

use crate::Shape;

/// Errors raised while validating or comparing tensor descriptors.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// A dimension is neither positive nor the dynamic marker.
    #[error("invalid dimension {dim} at axis {axis} of shape {shape}")]
    InvalidDimension { axis: usize, dim: i64, shape: Shape },

    /// A fully resolved shape was required.
    #[error("shape {0} still contains dynamic dimensions")]
    DynamicShape(Shape),

    /// The element count or byte size does not fit in `usize`.
    #[error("byte size of shape {0} overflows")]
    Overflow(Shape),

    /// Two descriptors disagree on an attribute that must match.
    #[error("descriptor mismatch on {attribute}: expected {expected}, got {actual}")]
    Mismatch {
        attribute: &'static str,
        expected: String,
        actual: String,
    },
}
