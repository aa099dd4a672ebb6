// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor shapes, including dimensions left open until execution.

use crate::{DType, TensorError};
use std::fmt;

/// Marker for a dimension whose extent is only known at execution time.
pub const DYNAMIC_DIM: i64 = -1;

/// Describes the dimensionality of a tensor.
///
/// A declared graph tensor may carry [`DYNAMIC_DIM`] entries; the shape
/// supplied when binding an input for execution must be fully resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Shape {
    dims: Vec<i64>,
}

impl Shape {
    /// Creates a new shape from the given dimensions.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::new(vec![2, 3, 4]);
    /// assert_eq!(s.rank(), 3);
    /// assert_eq!(s.num_elements(), Some(24));
    /// ```
    pub fn new(dims: Vec<i64>) -> Self {
        Self { dims }
    }

    /// Creates a scalar shape (rank 0).
    pub fn scalar() -> Self {
        Self { dims: vec![] }
    }

    /// Returns the number of dimensions (rank).
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the dimensions as a slice.
    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    /// Returns the size of a specific dimension, or `None` if out of bounds.
    pub fn dim(&self, axis: usize) -> Option<i64> {
        self.dims.get(axis).copied()
    }

    /// Returns `true` if any dimension is [`DYNAMIC_DIM`].
    pub fn is_dynamic(&self) -> bool {
        self.dims.iter().any(|&d| d == DYNAMIC_DIM)
    }

    /// Checks that every dimension is positive or dynamic.
    pub fn validate(&self) -> Result<(), TensorError> {
        for (axis, &dim) in self.dims.iter().enumerate() {
            if dim <= 0 && dim != DYNAMIC_DIM {
                return Err(TensorError::InvalidDimension {
                    axis,
                    dim,
                    shape: self.clone(),
                });
            }
        }
        Ok(())
    }

    /// Returns the total number of elements, or `None` while the shape is
    /// dynamic or the product overflows.
    ///
    /// For a scalar shape (rank 0), returns 1.
    pub fn num_elements(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| {
            let d = usize::try_from(d).ok()?;
            acc.checked_mul(d)
        })
    }

    /// Computes the memory footprint in bytes for a given [`DType`].
    pub fn size_bytes(&self, dtype: DType) -> Result<usize, TensorError> {
        if self.is_dynamic() {
            return Err(TensorError::DynamicShape(self.clone()));
        }
        self.num_elements()
            .and_then(|n| n.checked_mul(dtype.size_bytes()))
            .ok_or_else(|| TensorError::Overflow(self.clone()))
    }

    /// Returns `true` if `actual` is an instance of this declared shape:
    /// same rank, and every fixed dimension equal.
    pub fn accepts(&self, actual: &Shape) -> bool {
        self.rank() == actual.rank()
            && self
                .dims
                .iter()
                .zip(&actual.dims)
                .all(|(&declared, &got)| declared == DYNAMIC_DIM || declared == got)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if *d == DYNAMIC_DIM {
                write!(f, "?")?;
            } else {
                write!(f, "{d}")?;
            }
        }
        write!(f, "]")
    }
}

impl From<Vec<i64>> for Shape {
    fn from(dims: Vec<i64>) -> Self {
        Self::new(dims)
    }
}

impl From<&[i64]> for Shape {
    fn from(dims: &[i64]) -> Self {
        Self::new(dims.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_shape() {
        let s = Shape::scalar();
        assert_eq!(s.rank(), 0);
        assert_eq!(s.num_elements(), Some(1));
    }

    #[test]
    fn test_dynamic_shape() {
        let s = Shape::new(vec![DYNAMIC_DIM, 3]);
        assert!(s.is_dynamic());
        assert_eq!(s.num_elements(), None);
        assert!(matches!(
            s.size_bytes(DType::F32),
            Err(TensorError::DynamicShape(_))
        ));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_and_negative() {
        assert!(Shape::new(vec![2, 0]).validate().is_err());
        assert!(Shape::new(vec![-3]).validate().is_err());
    }

    #[test]
    fn test_size_bytes() {
        let s = Shape::new(vec![10, 20]);
        assert_eq!(s.size_bytes(DType::F32).unwrap(), 800);
        assert_eq!(s.size_bytes(DType::F16).unwrap(), 400);
        assert_eq!(s.size_bytes(DType::I8).unwrap(), 200);
    }

    #[test]
    fn test_overflow() {
        let s = Shape::new(vec![i64::MAX, i64::MAX]);
        assert!(matches!(s.size_bytes(DType::F32), Err(TensorError::Overflow(_))));
    }

    #[test]
    fn test_accepts() {
        let declared = Shape::new(vec![DYNAMIC_DIM, 3]);
        assert!(declared.accepts(&Shape::new(vec![7, 3])));
        assert!(!declared.accepts(&Shape::new(vec![7, 4])));
        assert!(!declared.accepts(&Shape::new(vec![3])));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Shape::new(vec![2, 3, 4])), "[2, 3, 4]");
        assert_eq!(format!("{}", Shape::new(vec![DYNAMIC_DIM, 4])), "[?, 4]");
    }
}
