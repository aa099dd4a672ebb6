// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Full tensor descriptors: dtype, shape, layout and quantisation.

use crate::{DType, Shape, TensorError};

/// Memory layout of a tensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    None,
    Nchw,
    Nhwc,
}

/// Per-channel (or per-tensor, when only one is given) quantisation parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuantParam {
    pub num_bits: u32,
    pub scale: f64,
    pub zero_point: i32,
}

/// Describes a tensor without owning its data.
///
/// # Examples
/// ```
/// use tensor_core::{DType, Shape, TensorDesc};
/// let d = TensorDesc::new(DType::F32, Shape::new(vec![3, 3]));
/// assert_eq!(d.byte_size().unwrap(), 36);
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TensorDesc {
    #[serde(default)]
    pub name: String,
    pub dtype: DType,
    pub shape: Shape,
    #[serde(default)]
    pub format: Format,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quant: Vec<QuantParam>,
}

impl TensorDesc {
    /// Creates an unnamed, unquantised descriptor.
    pub fn new(dtype: DType, shape: Shape) -> Self {
        Self {
            name: String::new(),
            dtype,
            shape,
            format: Format::None,
            quant: Vec::new(),
        }
    }

    /// Sets the tensor name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the memory layout.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Returns the byte size of the described tensor. Fails while the shape
    /// is dynamic.
    pub fn byte_size(&self) -> Result<usize, TensorError> {
        self.shape.size_bytes(self.dtype)
    }

    /// Checks that `actual` can be bound where `self` is declared.
    ///
    /// Dtype, format and quantisation must match exactly. Shapes must agree
    /// in rank and on every dimension `self` fixes.
    pub fn check_compatible(&self, actual: &TensorDesc) -> Result<(), TensorError> {
        if self.dtype != actual.dtype {
            return Err(mismatch("dtype", self.dtype, actual.dtype));
        }
        if self.format != actual.format {
            return Err(mismatch(
                "format",
                format!("{:?}", self.format),
                format!("{:?}", actual.format),
            ));
        }
        if self.quant != actual.quant {
            return Err(mismatch(
                "quantisation",
                format!("{:?}", self.quant),
                format!("{:?}", actual.quant),
            ));
        }
        if !self.shape.accepts(&actual.shape) {
            return Err(mismatch("shape", &self.shape, &actual.shape));
        }
        Ok(())
    }
}

fn mismatch(
    attribute: &'static str,
    expected: impl ToString,
    actual: impl ToString,
) -> TensorError {
    TensorError::Mismatch {
        attribute,
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DYNAMIC_DIM;

    #[test]
    fn test_byte_size() {
        let d = TensorDesc::new(DType::I32, Shape::new(vec![2, 5]));
        assert_eq!(d.byte_size().unwrap(), 40);
    }

    #[test]
    fn test_compatible_with_dynamic_declaration() {
        let declared = TensorDesc::new(DType::F32, Shape::new(vec![DYNAMIC_DIM, 4]));
        let actual = TensorDesc::new(DType::F32, Shape::new(vec![8, 4]));
        assert!(declared.check_compatible(&actual).is_ok());
    }

    #[test]
    fn test_dtype_mismatch() {
        let declared = TensorDesc::new(DType::F32, Shape::new(vec![4]));
        let actual = TensorDesc::new(DType::I32, Shape::new(vec![4]));
        let err = declared.check_compatible(&actual).unwrap_err();
        assert!(matches!(err, TensorError::Mismatch { attribute: "dtype", .. }));
    }

    #[test]
    fn test_format_mismatch() {
        let declared =
            TensorDesc::new(DType::F32, Shape::new(vec![1, 3, 2, 2])).with_format(Format::Nchw);
        let actual =
            TensorDesc::new(DType::F32, Shape::new(vec![1, 3, 2, 2])).with_format(Format::Nhwc);
        assert!(declared.check_compatible(&actual).is_err());
    }

    #[test]
    fn test_json_defaults() {
        let d: TensorDesc = serde_json::from_str(r#"{"dtype":"f32","shape":[-1,9]}"#).unwrap();
        assert_eq!(d.format, Format::None);
        assert!(d.quant.is_empty());
        assert!(d.shape.is_dynamic());
    }
}
