// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON graph format.
//!
//! # Format
//! ```json
//! {
//!   "name": "add",
//!   "tensors": [
//!     { "name": "a", "dtype": "f32", "shape": [3, 3] },
//!     { "name": "b", "dtype": "f32", "shape": [3, 3] },
//!     { "name": "c", "dtype": "f32", "shape": [3, 3] }
//!   ],
//!   "nodes": [
//!     { "name": "add0", "op": "add", "inputs": [0, 1], "outputs": [2] }
//!   ],
//!   "inputs": [0, 1],
//!   "outputs": [2]
//! }
//! ```
//!
//! The same format is used by the reference device to serialise compiled
//! artifacts into cache chunks.

use crate::graph::{GraphState, Validated};
use crate::{ModelError, ModelGraph, Node, OpType};
use std::path::Path;
use tensor_core::TensorDesc;

/// Serialisable form of a [`ModelGraph`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphDef {
    pub name: String,
    pub tensors: Vec<TensorDesc>,
    pub nodes: Vec<NodeDef>,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
}

/// A node entry in the JSON format. The op is a loose string so that
/// aliases such as `"matmul"` or `"conv"` are accepted.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeDef {
    pub name: String,
    pub op: String,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
}

impl GraphDef {
    /// Captures the serialisable form of a graph.
    pub fn from_graph<S: GraphState>(graph: &ModelGraph<S>) -> Self {
        Self {
            name: graph.name.clone(),
            tensors: graph.tensors.clone(),
            nodes: graph
                .nodes
                .iter()
                .map(|n| NodeDef {
                    name: n.name.clone(),
                    op: n.op.as_str().to_string(),
                    inputs: n.inputs.clone(),
                    outputs: n.outputs.clone(),
                })
                .collect(),
            inputs: graph.inputs.clone(),
            outputs: graph.outputs.clone(),
        }
    }

    /// Builds and validates the graph.
    pub fn into_graph(self) -> Result<ModelGraph<Validated>, ModelError> {
        let nodes = self
            .nodes
            .into_iter()
            .map(|n| {
                let op = OpType::from_str_loose(&n.op).ok_or_else(|| ModelError::InvalidNode {
                    node: n.name.clone(),
                    detail: format!("unrecognised op '{}'", n.op),
                })?;
                Ok(Node::new(n.name, op, n.inputs, n.outputs))
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        ModelGraph::new(self.name, self.tensors, nodes, self.inputs, self.outputs).validate()
    }
}

/// Reads and writes graphs in the JSON format.
pub struct GraphLoader;

impl GraphLoader {
    /// Loads and validates a graph from a JSON file.
    pub fn load(path: &Path) -> Result<ModelGraph<Validated>, ModelError> {
        let content = std::fs::read_to_string(path)?;
        let graph = Self::from_json(&content)?;
        tracing::debug!("loaded graph from '{}': {}", path.display(), graph.summary());
        Ok(graph)
    }

    /// Parses and validates a graph from a JSON string.
    pub fn from_json(json: &str) -> Result<ModelGraph<Validated>, ModelError> {
        let def: GraphDef = serde_json::from_str(json)?;
        def.into_graph()
    }

    /// Parses and validates a graph from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<ModelGraph<Validated>, ModelError> {
        let def: GraphDef = serde_json::from_slice(bytes)?;
        def.into_graph()
    }

    /// Serialises a graph to compact JSON.
    pub fn to_json<S: GraphState>(graph: &ModelGraph<S>) -> Result<String, ModelError> {
        Ok(serde_json::to_string(&GraphDef::from_graph(graph))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADD_JSON: &str = r#"{
        "name": "add",
        "tensors": [
            { "name": "a", "dtype": "f32", "shape": [3, 3] },
            { "name": "b", "dtype": "f32", "shape": [3, 3] },
            { "name": "c", "dtype": "f32", "shape": [3, 3] }
        ],
        "nodes": [ { "name": "add0", "op": "plus", "inputs": [0, 1], "outputs": [2] } ],
        "inputs": [0, 1],
        "outputs": [2]
    }"#;

    #[test]
    fn test_from_json() {
        let g = GraphLoader::from_json(ADD_JSON).unwrap();
        assert_eq!(g.name, "add");
        assert_eq!(g.nodes[0].op, OpType::Add);
        assert_eq!(g.tensors[2].name, "c");
    }

    #[test]
    fn test_unknown_op() {
        let json = ADD_JSON.replace("\"plus\"", "\"teleport\"");
        let err = GraphLoader::from_json(&json).unwrap_err();
        assert!(matches!(err, ModelError::InvalidNode { .. }));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            GraphLoader::from_json("{ not json"),
            Err(ModelError::ParseError(_))
        ));
    }

    #[test]
    fn test_json_roundtrip_preserves_structure() {
        let g = GraphLoader::from_json(ADD_JSON).unwrap();
        let back = GraphLoader::from_json(&GraphLoader::to_json(&g).unwrap()).unwrap();
        assert_eq!(back.nodes, g.nodes);
        assert_eq!(back.tensors, g.tensors);
        assert_eq!(back.inputs, g.inputs);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("add.json");
        std::fs::write(&path, ADD_JSON).unwrap();
        let g = GraphLoader::load(&path).unwrap();
        assert_eq!(g.num_nodes(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = GraphLoader::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ModelError::ReadError(_)));
    }
}
