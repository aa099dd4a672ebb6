// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Logical tensor descriptions used across the runtime.
//!
//! This crate provides:
//! - [`DType`]: element data types understood by devices.
//! - [`Shape`]: dimensions, where `-1` marks a dimension resolved only at
//!   execution time.
//! - [`Format`] and [`QuantParam`]: layout and quantisation metadata.
//! - [`TensorDesc`]: the full descriptor handed between graph, compilation
//!   and executor.
//!
//! No tensor data lives here. Buffers are owned by devices (see the
//! `memory-manager` and `device-hal` crates); descriptors only say how to
//! interpret them.

mod desc;
mod dtype;
mod error;
mod shape;

pub use desc::{Format, QuantParam, TensorDesc};
pub use dtype::DType;
pub use error::TensorError;
pub use shape::{Shape, DYNAMIC_DIM};
