// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph nodes and operation kinds.
//!
//! A [`Node`] references tensors by their index in the owning graph's tensor
//! table. Operator attributes are not modelled; devices that need them get
//! them through their own marshalling layer.

/// The operation a node performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    Add,
    Sub,
    Mul,
    Div,
    Maximum,
    Minimum,
    Relu,
    Identity,
    MatMul,
    Conv2d,
    Softmax,
    Reshape,
    Concat,
}

impl OpType {
    /// Parses an operation name, accepting common aliases
    /// (`"plus"`, `"conv"`, `"matmul"`, ...).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "add" | "plus" => Some(Self::Add),
            "sub" | "subtract" | "minus" => Some(Self::Sub),
            "mul" | "multiply" => Some(Self::Mul),
            "div" | "divide" => Some(Self::Div),
            "maximum" | "max" => Some(Self::Maximum),
            "minimum" | "min" => Some(Self::Minimum),
            "relu" => Some(Self::Relu),
            "identity" | "copy" => Some(Self::Identity),
            "mat_mul" | "matmul" | "gemm" => Some(Self::MatMul),
            "conv2d" | "conv_2d" | "conv" => Some(Self::Conv2d),
            "softmax" => Some(Self::Softmax),
            "reshape" => Some(Self::Reshape),
            "concat" => Some(Self::Concat),
            _ => None,
        }
    }

    /// Returns a human-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Maximum => "maximum",
            Self::Minimum => "minimum",
            Self::Relu => "relu",
            Self::Identity => "identity",
            Self::MatMul => "mat_mul",
            Self::Conv2d => "conv2d",
            Self::Softmax => "softmax",
            Self::Reshape => "reshape",
            Self::Concat => "concat",
        }
    }

    /// Returns the exact number of inputs the operation takes, or `None`
    /// when it is variadic.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Self::Add
            | Self::Sub
            | Self::Mul
            | Self::Div
            | Self::Maximum
            | Self::Minimum => Some(2),
            Self::MatMul | Self::Reshape => Some(2),
            Self::Relu | Self::Identity | Self::Softmax => Some(1),
            Self::Conv2d | Self::Concat => None,
        }
    }
}

impl std::fmt::Display for OpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single operation in the graph.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    /// Node name, used in diagnostics only.
    pub name: String,
    pub op: OpType,
    /// Indices into the graph's tensor table.
    pub inputs: Vec<usize>,
    /// Indices into the graph's tensor table.
    pub outputs: Vec<usize>,
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        op: OpType,
        inputs: Vec<usize>,
        outputs: Vec<usize>,
    ) -> Self {
        Self {
            name: name.into(),
            op,
            inputs,
            outputs,
        }
    }

    /// Returns a one-line summary of this node.
    pub fn summary(&self) -> String {
        format!("{} ({}): {:?} -> {:?}", self.name, self.op, self.inputs, self.outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_loose() {
        assert_eq!(OpType::from_str_loose("ADD"), Some(OpType::Add));
        assert_eq!(OpType::from_str_loose("gemm"), Some(OpType::MatMul));
        assert_eq!(OpType::from_str_loose("conv"), Some(OpType::Conv2d));
        assert_eq!(OpType::from_str_loose("bogus"), None);
    }

    #[test]
    fn test_roundtrip_labels() {
        for op in [OpType::Add, OpType::Relu, OpType::MatMul, OpType::Conv2d] {
            assert_eq!(OpType::from_str_loose(op.as_str()), Some(op));
        }
    }

    #[test]
    fn test_arity() {
        assert_eq!(OpType::Add.arity(), Some(2));
        assert_eq!(OpType::Relu.arity(), Some(1));
        assert_eq!(OpType::Concat.arity(), None);
    }
}
