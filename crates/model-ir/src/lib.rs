// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-ir
//!
//! A minimal operator-graph representation that the compilation pipeline
//! reads but never mutates.
//!
//! - [`OpType`]: the operation a node performs.
//! - [`Node`]: one operation with tensor-index inputs and outputs.
//! - [`ModelGraph`]: tensors, nodes and graph I/O lists, with a
//!   **type-state pattern** (`Loaded` → `Validated`).
//! - [`GraphLoader`]: reads and writes the JSON graph format.
//!
//! # Example
//! ```no_run
//! use model_ir::GraphLoader;
//! use std::path::Path;
//!
//! let graph = GraphLoader::load(Path::new("./add.json")).unwrap();
//! println!("{}", graph.summary());
//! ```

mod error;
pub mod graph;
mod loader;
mod node;

pub use error::ModelError;
pub use graph::ModelGraph;
pub use loader::{GraphDef, GraphLoader};
pub use node::{Node, OpType};
