// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model graph: tensors, nodes and the graph's input/output lists.
//!
//! # Type-State Pattern
//!
//! ```text
//! ModelGraph<Loaded>    : parsed or built, not yet checked.
//!       │  .validate()
//!       ▼
//! ModelGraph<Validated> : indices checked, ready for compilation.
//! ```
//!
//! Compilation only accepts `ModelGraph<Validated>`, so devices never see a
//! graph with dangling tensor references.

use crate::{ModelError, Node};
use std::collections::HashSet;
use std::fmt;
use tensor_core::TensorDesc;

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: graph has been loaded but not validated.
#[derive(Debug, Clone)]
pub struct Loaded;

/// Marker: graph has been validated and is ready for compilation.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Loaded {}
impl GraphState for Validated {}

// ── ModelGraph ─────────────────────────────────────────────────────

/// A dataflow graph of operations over a shared tensor table.
#[derive(Debug, Clone)]
pub struct ModelGraph<S: GraphState = Loaded> {
    /// Human-readable model name.
    pub name: String,
    /// Every tensor the graph mentions, addressed by index.
    pub tensors: Vec<TensorDesc>,
    /// Operations, in execution order.
    pub nodes: Vec<Node>,
    /// Tensor indices fed by the caller.
    pub inputs: Vec<usize>,
    /// Tensor indices returned to the caller.
    pub outputs: Vec<usize>,
    _state: std::marker::PhantomData<S>,
}

// ── Loaded state ───────────────────────────────────────────────────

impl ModelGraph<Loaded> {
    /// Creates a new graph in the `Loaded` state.
    pub fn new(
        name: String,
        tensors: Vec<TensorDesc>,
        nodes: Vec<Node>,
        inputs: Vec<usize>,
        outputs: Vec<usize>,
    ) -> Self {
        Self {
            name,
            tensors,
            nodes,
            inputs,
            outputs,
            _state: std::marker::PhantomData,
        }
    }

    /// Validates the graph and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - At least one node, one input and one output.
    /// - Every tensor descriptor has legal dimensions.
    /// - Every index (node I/O, graph I/O) is inside the tensor table.
    /// - Graph inputs and outputs are not listed twice.
    /// - Every node produces at least one tensor, and no tensor is produced
    ///   twice or produced when it is a graph input.
    pub fn validate(self) -> Result<ModelGraph<Validated>, ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::InvalidGraph("graph contains no nodes".into()));
        }
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(ModelError::InvalidGraph(
                "graph must declare at least one input and one output".into(),
            ));
        }

        for (index, desc) in self.tensors.iter().enumerate() {
            desc.shape
                .validate()
                .map_err(|source| ModelError::InvalidTensor { index, source })?;
        }

        let count = self.tensors.len();
        check_io_list("input", &self.inputs, count)?;
        check_io_list("output", &self.outputs, count)?;

        let graph_inputs: HashSet<usize> = self.inputs.iter().copied().collect();
        let mut produced = HashSet::new();
        for node in &self.nodes {
            if node.outputs.is_empty() {
                return Err(ModelError::InvalidNode {
                    node: node.name.clone(),
                    detail: "node produces no tensors".into(),
                });
            }
            if let Some(arity) = node.op.arity() {
                if node.inputs.len() != arity {
                    return Err(ModelError::InvalidNode {
                        node: node.name.clone(),
                        detail: format!(
                            "{} expects {arity} inputs, got {}",
                            node.op,
                            node.inputs.len()
                        ),
                    });
                }
            }
            for &idx in node.inputs.iter().chain(&node.outputs) {
                if idx >= count {
                    return Err(ModelError::InvalidNode {
                        node: node.name.clone(),
                        detail: format!(
                            "tensor index {idx} out of range (graph has {count} tensors)"
                        ),
                    });
                }
            }
            for &idx in &node.outputs {
                if graph_inputs.contains(&idx) || !produced.insert(idx) {
                    return Err(ModelError::InvalidNode {
                        node: node.name.clone(),
                        detail: format!("tensor {idx} is written more than once"),
                    });
                }
            }
        }

        for &idx in &self.outputs {
            if !produced.contains(&idx) && !graph_inputs.contains(&idx) {
                tracing::warn!("graph '{}': output tensor {idx} is never produced", self.name);
            }
        }

        Ok(ModelGraph {
            name: self.name,
            tensors: self.tensors,
            nodes: self.nodes,
            inputs: self.inputs,
            outputs: self.outputs,
            _state: std::marker::PhantomData,
        })
    }
}

fn check_io_list(kind: &str, list: &[usize], count: usize) -> Result<(), ModelError> {
    let mut seen = HashSet::new();
    for &idx in list {
        if idx >= count {
            return Err(ModelError::InvalidGraph(format!(
                "graph {kind} index {idx} out of range (graph has {count} tensors)"
            )));
        }
        if !seen.insert(idx) {
            return Err(ModelError::InvalidGraph(format!(
                "tensor {idx} listed twice as graph {kind}"
            )));
        }
    }
    Ok(())
}

// ── Validated state ────────────────────────────────────────────────

impl ModelGraph<Validated> {
    /// Returns the total number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns a reference to a node by index.
    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Returns an iterator over the nodes in execution order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Returns the descriptor of a tensor by table index.
    pub fn tensor(&self, index: usize) -> Option<&TensorDesc> {
        self.tensors.get(index)
    }

    /// Returns the descriptors of the graph inputs, in declaration order.
    pub fn input_descs(&self) -> Vec<TensorDesc> {
        self.inputs.iter().map(|&i| self.tensors[i].clone()).collect()
    }

    /// Returns the descriptors of the graph outputs, in declaration order.
    pub fn output_descs(&self) -> Vec<TensorDesc> {
        self.outputs.iter().map(|&i| self.tensors[i].clone()).collect()
    }

    /// Returns `true` if any graph input has an unresolved dimension.
    pub fn has_dynamic_input(&self) -> bool {
        self.inputs.iter().any(|&i| self.tensors[i].shape.is_dynamic())
    }

    /// Returns a summary string describing the graph.
    pub fn summary(&self) -> String {
        format!(
            "Graph '{}': {} nodes, {} tensors, {} inputs, {} outputs{}",
            self.name,
            self.num_nodes(),
            self.tensors.len(),
            self.inputs.len(),
            self.outputs.len(),
            if self.has_dynamic_input() { " (dynamic inputs)" } else { "" },
        )
    }
}

// ── Shared implementations ─────────────────────────────────────────

impl<S: GraphState> fmt::Display for ModelGraph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ModelGraph '{}' ({} nodes):", self.name, self.nodes.len())?;
        for node in &self.nodes {
            writeln!(f, "  {}", node.summary())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OpType;
    use tensor_core::{DType, Shape, DYNAMIC_DIM};

    fn f32_desc(dims: Vec<i64>) -> TensorDesc {
        TensorDesc::new(DType::F32, Shape::new(dims))
    }

    /// a + b -> c
    fn add_graph() -> ModelGraph<Loaded> {
        ModelGraph::new(
            "add".into(),
            vec![f32_desc(vec![3, 3]), f32_desc(vec![3, 3]), f32_desc(vec![3, 3])],
            vec![Node::new("add0", OpType::Add, vec![0, 1], vec![2])],
            vec![0, 1],
            vec![2],
        )
    }

    #[test]
    fn test_validate_ok() {
        let g = add_graph().validate().unwrap();
        assert_eq!(g.num_nodes(), 1);
        assert_eq!(g.input_descs().len(), 2);
        assert_eq!(g.output_descs()[0].shape.dims(), &[3, 3]);
        assert!(!g.has_dynamic_input());
    }

    #[test]
    fn test_validate_empty() {
        let mut g = add_graph();
        g.nodes.clear();
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_validate_bad_index() {
        let mut g = add_graph();
        g.nodes[0].inputs[1] = 9;
        assert!(matches!(g.validate(), Err(ModelError::InvalidNode { .. })));
    }

    #[test]
    fn test_validate_duplicate_input() {
        let mut g = add_graph();
        g.inputs = vec![0, 0];
        assert!(matches!(g.validate(), Err(ModelError::InvalidGraph(_))));
    }

    #[test]
    fn test_validate_wrong_arity() {
        let mut g = add_graph();
        g.nodes[0].inputs = vec![0];
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_validate_write_to_input() {
        let mut g = add_graph();
        g.nodes[0].outputs = vec![0];
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_validate_zero_dim() {
        let mut g = add_graph();
        g.tensors[1] = f32_desc(vec![3, 0]);
        assert!(matches!(g.validate(), Err(ModelError::InvalidTensor { index: 1, .. })));
    }

    #[test]
    fn test_dynamic_input() {
        let mut g = add_graph();
        g.tensors[0] = f32_desc(vec![DYNAMIC_DIM, 3]);
        let g = g.validate().unwrap();
        assert!(g.has_dynamic_input());
        assert!(g.summary().contains("dynamic"));
    }

    #[test]
    fn test_display() {
        let display = format!("{}", add_graph());
        assert!(display.contains("add0"));
    }
}
