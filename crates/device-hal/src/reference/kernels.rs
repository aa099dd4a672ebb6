// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! f32 elementwise kernels used by the reference device.

use super::SUPPORTED_OPS;
use crate::DeviceError;
use model_ir::OpType;

/// Returns `true` if the reference device can execute `op`.
pub fn is_supported(op: OpType) -> bool {
    SUPPORTED_OPS.contains(&op)
}

/// A computed tensor value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Value {
    pub dims: Vec<i64>,
    pub data: Vec<f32>,
}

pub(crate) fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub(crate) fn encode_f32(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

/// Applies a one-operand op.
pub(crate) fn unary(op: OpType, a: &Value) -> Result<Value, DeviceError> {
    let f: fn(f32) -> f32 = match op {
        OpType::Relu => |x| x.max(0.0),
        OpType::Identity => |x| x,
        other => return Err(unsupported(other)),
    };
    Ok(Value {
        dims: a.dims.clone(),
        data: a.data.iter().copied().map(f).collect(),
    })
}

/// Applies a two-operand op. Operands must have equal shapes, or one of
/// them must hold a single element.
pub(crate) fn binary(op: OpType, a: &Value, b: &Value) -> Result<Value, DeviceError> {
    let f: fn(f32, f32) -> f32 = match op {
        OpType::Add => |x, y| x + y,
        OpType::Sub => |x, y| x - y,
        OpType::Mul => |x, y| x * y,
        OpType::Div => |x, y| x / y,
        OpType::Maximum => f32::max,
        OpType::Minimum => f32::min,
        other => return Err(unsupported(other)),
    };

    if a.dims == b.dims {
        let data = a.data.iter().zip(&b.data).map(|(&x, &y)| f(x, y)).collect();
        return Ok(Value { dims: a.dims.clone(), data });
    }
    if b.data.len() == 1 {
        let y = b.data[0];
        let data = a.data.iter().map(|&x| f(x, y)).collect();
        return Ok(Value { dims: a.dims.clone(), data });
    }
    if a.data.len() == 1 {
        let x = a.data[0];
        let data = b.data.iter().map(|&y| f(x, y)).collect();
        return Ok(Value { dims: b.dims.clone(), data });
    }
    Err(DeviceError::InvalidParameter(format!(
        "{op}: operand shapes {:?} and {:?} are not compatible",
        a.dims, b.dims
    )))
}

fn unsupported(op: OpType) -> DeviceError {
    DeviceError::InvalidParameter(format!("operation '{op}' has no reference kernel"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(dims: &[i64], data: &[f32]) -> Value {
        Value { dims: dims.to_vec(), data: data.to_vec() }
    }

    #[test]
    fn test_binary_same_shape() {
        let out = binary(OpType::Sub, &v(&[2], &[5.0, 1.0]), &v(&[2], &[2.0, 3.0])).unwrap();
        assert_eq!(out, v(&[2], &[3.0, -2.0]));
    }

    #[test]
    fn test_binary_scalar_operand() {
        let out = binary(OpType::Mul, &v(&[1], &[2.0]), &v(&[3], &[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(out, v(&[3], &[2.0, 4.0, 6.0]));
        let out = binary(OpType::Maximum, &v(&[2], &[-1.0, 4.0]), &v(&[], &[0.0])).unwrap();
        assert_eq!(out.data, vec![0.0, 4.0]);
    }

    #[test]
    fn test_binary_shape_mismatch() {
        assert!(binary(OpType::Add, &v(&[2], &[1.0, 2.0]), &v(&[3], &[1.0, 2.0, 3.0])).is_err());
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary(OpType::Relu, &v(&[2], &[-1.0, 2.0])).unwrap().data, vec![0.0, 2.0]);
        assert!(unary(OpType::Softmax, &v(&[1], &[1.0])).is_err());
    }

    #[test]
    fn test_codec() {
        let values = [1.5f32, -0.25];
        assert_eq!(decode_f32(&encode_f32(&values)), values.to_vec());
        assert!(is_supported(OpType::Div));
        assert!(!is_supported(OpType::Conv2d));
    }
}
