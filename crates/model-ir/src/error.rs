// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph loading and validation.

/// Errors that can occur when working with graph representations.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The graph file could not be read.
    #[error("failed to read graph file: {0}")]
    ReadError(#[from] std::io::Error),

    /// The graph JSON is malformed.
    #[error("failed to parse graph: {0}")]
    ParseError(#[from] serde_json::Error),

    /// A node definition is invalid (bad tensor index, no outputs, ...).
    #[error("invalid node '{node}': {detail}")]
    InvalidNode { node: String, detail: String },

    /// A tensor descriptor is invalid.
    #[error("invalid tensor {index}: {source}")]
    InvalidTensor {
        index: usize,
        #[source]
        source: tensor_core::TensorError,
    },

    /// The graph as a whole is malformed.
    #[error("invalid model graph: {0}")]
    InvalidGraph(String),
}
