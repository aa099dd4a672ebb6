// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! The compile-once, run-many core of nnrt.
//!
//! The runtime takes:
//! - A validated `ModelGraph` from `model-ir`.
//! - A `DeviceManager` from `device-hal` holding the available back-ends.
//!
//! and produces an [`ExecutionPlan`] through a [`Compilation`], optionally
//! persisting the compiled artifact in an integrity-checked cache directory.
//! An [`Executor`] then binds input/output buffers to the plan and runs it.
//!
//! # Pipeline
//! ```text
//! Compilation::new(graph, manager)
//!     │  .set_device(id) / .set_cache_dir(dir, v) / .set_performance(..)
//!     ▼
//! .build() ──► ExecutionPlan (PreparedModel + Device)
//!     │
//!     ▼
//! Executor::new(&compilation)
//!     │  .set_input / .set_output / .run   (repeatable)
//!     ▼
//!   results in caller buffers or shared memory
//! ```
//!
//! # Async Execution
//! [`Executor::run_async`] runs the blocking `run` on a `tokio` blocking
//! worker and races it against a timer.
//!
//! # Example
//! ```
//! use device_hal::{DeviceManager, ReferenceOptions};
//! use model_ir::GraphLoader;
//! use runtime::{Compilation, Executor};
//! use std::sync::Arc;
//! use tensor_core::{DType, Shape, TensorDesc};
//!
//! let graph = GraphLoader::from_json(r#"{
//!     "name": "relu",
//!     "tensors": [
//!         {"dtype": "f32", "shape": [2]},
//!         {"dtype": "f32", "shape": [2]}
//!     ],
//!     "nodes": [{"name": "relu", "op": "relu", "inputs": [0], "outputs": [1]}],
//!     "inputs": [0],
//!     "outputs": [1]
//! }"#).unwrap();
//!
//! let manager = Arc::new(DeviceManager::new());
//! let id = manager.init(ReferenceOptions::default()).unwrap();
//!
//! let mut compilation = Compilation::new(graph, manager);
//! compilation.set_device(id).unwrap();
//! compilation.build().unwrap();
//!
//! let input: Vec<u8> = [-1.0f32, 3.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
//! let mut output = [0u8; 8];
//! let mut exec = Executor::new(&compilation).unwrap();
//! exec.set_input(0, &TensorDesc::new(DType::F32, Shape::new(vec![2])), &input).unwrap();
//! exec.set_output(0, &mut output).unwrap();
//! exec.run().unwrap();
//! assert_eq!(exec.get_output_shape(0).unwrap(), vec![2]);
//! ```

mod buffer;
pub mod cache;
mod compilation;
mod config;
mod error;
mod execution_plan;
mod executor;

pub use cache::{crc16, CacheManifest, CacheStore, CachedChunks};
pub use compilation::{BuildKind, Compilation};
pub use config::{ReferenceConfig, RuntimeConfig};
pub use error::{ErrorKind, RuntimeError};
pub use execution_plan::ExecutionPlan;
pub use executor::Executor;
