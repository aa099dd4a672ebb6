// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-session input/output binding and the run call.
//!
//! An [`Executor`] keeps one slot per declared graph input and output. Each
//! slot is either a runtime-owned device buffer (optionally paired with a
//! caller output slice) or caller-registered shared memory:
//!
//! ```text
//! set_input(i, desc, &[u8])         copy into Owned buffer (reused if big enough)
//! set_input_from_memory(i, desc, r) bind Shared(r), no copy
//! set_output(i, &mut [u8])          Owned buffer + caller slice, copy back after run
//! set_output_from_memory(i, r)      bind Shared(r), results land in place
//! ```
//!
//! Runtime-owned buffers return to their device when replaced or when the
//! executor is dropped. Shared memory is never released by the executor.
//!
//! An executor is not meant to be shared between threads; it takes
//! `&mut self` for every mutating call. `Executor<'static>` is `Send` and can
//! be moved to a worker, which is what [`Executor::run_async`] does.

use crate::buffer::{DeviceBuffer, TensorBuffer};
use crate::{Compilation, ExecutionPlan, RuntimeError};
use device_hal::DimRanges;
use memory_manager::MemoryRegion;
use std::sync::Arc;
use std::time::Duration;
use tensor_core::TensorDesc;

/// Binds data to a built compilation and runs it.
pub struct Executor<'a> {
    plan: Arc<ExecutionPlan>,
    input_descs: Vec<TensorDesc>,
    output_descs: Vec<TensorDesc>,
    inputs: Vec<Option<TensorBuffer<'a>>>,
    outputs: Vec<Option<TensorBuffer<'a>>>,
    /// Buffers handed out by `create_*_memory`, per index.
    input_memories: Vec<Vec<DeviceBuffer>>,
    output_memories: Vec<Vec<DeviceBuffer>>,
    dim_ranges: Option<DimRanges>,
    /// Output dims of the last successful run; `None` until then.
    last_run: Option<Vec<Vec<i64>>>,
}

impl<'a> Executor<'a> {
    /// Creates an executor for a built compilation.
    pub fn new(compilation: &Compilation) -> Result<Self, RuntimeError> {
        let plan = compilation.execution_plan()?;
        let graph = compilation.graph();
        let input_descs = graph.input_descs();
        let output_descs = graph.output_descs();

        let dim_ranges = match plan.input_dim_ranges() {
            Ok(ranges) => Some(ranges),
            Err(e) if e.is_not_supported() => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            plan,
            inputs: input_descs.iter().map(|_| None).collect(),
            outputs: output_descs.iter().map(|_| None).collect(),
            input_memories: input_descs.iter().map(|_| Vec::new()).collect(),
            output_memories: output_descs.iter().map(|_| Vec::new()).collect(),
            input_descs,
            output_descs,
            dim_ranges,
            last_run: None,
        })
    }

    pub fn input_count(&self) -> usize {
        self.input_descs.len()
    }

    pub fn output_count(&self) -> usize {
        self.output_descs.len()
    }

    // ── Inputs ─────────────────────────────────────────────────

    /// Copies `data` into device memory for input `index`.
    ///
    /// `desc` must be fully resolved and compatible with the declared input.
    /// The existing runtime-owned buffer is reused when it can hold `data`.
    pub fn set_input(
        &mut self,
        index: usize,
        desc: &TensorDesc,
        data: &[u8],
    ) -> Result<(), RuntimeError> {
        let required = self.check_input(index, desc)?;
        if data.len() < required {
            return Err(RuntimeError::InvalidParameter(format!(
                "input {index}: {} bytes given, {} needed for {}",
                data.len(),
                required,
                desc.shape
            )));
        }
        self.last_run = None;

        let reusable = self.inputs[index]
            .as_ref()
            .and_then(|slot| slot.backing.owned_capacity())
            .is_some_and(|capacity| capacity >= data.len());

        if reusable {
            if let Some(slot) = self.inputs[index].as_mut() {
                slot.backing.memory().write(0, data)?;
                slot.desc = desc.clone();
                slot.length = data.len();
                tracing::debug!("input {index}: reused device buffer for {} bytes", data.len());
                return Ok(());
            }
        }

        self.inputs[index] = None;
        let buffer = DeviceBuffer::allocate(self.plan.input_device(), data.len())?;
        buffer.memory().write(0, data)?;
        self.inputs[index] = Some(TensorBuffer::owned(desc.clone(), buffer, data.len()));
        tracing::debug!("input {index}: allocated device buffer of {} bytes", data.len());
        Ok(())
    }

    /// Binds caller-registered memory to input `index` without copying.
    pub fn set_input_from_memory(
        &mut self,
        index: usize,
        desc: &TensorDesc,
        memory: &MemoryRegion,
    ) -> Result<(), RuntimeError> {
        let required = self.check_input(index, desc)?;
        check_region(memory, required, "input", index)?;
        self.last_run = None;
        self.inputs[index] = Some(TensorBuffer::shared(desc.clone(), memory.clone()));
        tracing::debug!("input {index}: bound shared region {}", memory.id());
        Ok(())
    }

    // ── Outputs ────────────────────────────────────────────────

    /// Registers `buffer` to receive output `index` after each run.
    ///
    /// The device buffer behind the slot is reused when it is at least
    /// `buffer.len()` bytes; only the caller slice is swapped.
    pub fn set_output(&mut self, index: usize, buffer: &'a mut [u8]) -> Result<(), RuntimeError> {
        self.check_output_index(index)?;
        let len = buffer.len();
        self.check_output_capacity(index, len)?;
        self.last_run = None;

        let reusable = self.outputs[index]
            .as_ref()
            .and_then(|slot| slot.backing.owned_capacity())
            .is_some_and(|capacity| capacity >= len);

        if reusable {
            if let Some(slot) = self.outputs[index].as_mut() {
                slot.host = Some(buffer);
                slot.length = len;
                tracing::debug!("output {index}: reused device buffer for {len} bytes");
                return Ok(());
            }
        }

        self.outputs[index] = None;
        let device_buffer = DeviceBuffer::allocate(self.plan.output_device(), len)?;
        let mut slot = TensorBuffer::owned(self.output_descs[index].clone(), device_buffer, len);
        slot.host = Some(buffer);
        self.outputs[index] = Some(slot);
        tracing::debug!("output {index}: allocated device buffer of {len} bytes");
        Ok(())
    }

    /// Binds caller-registered memory as the destination of output `index`.
    pub fn set_output_from_memory(
        &mut self,
        index: usize,
        memory: &MemoryRegion,
    ) -> Result<(), RuntimeError> {
        self.check_output_index(index)?;
        self.check_output_capacity(index, memory.len())?;
        check_region(memory, 0, "output", index)?;
        self.last_run = None;
        self.outputs[index] = Some(TensorBuffer::shared(
            self.output_descs[index].clone(),
            memory.clone(),
        ));
        tracing::debug!("output {index}: bound shared region {}", memory.id());
        Ok(())
    }

    /// Actual dimensions of output `index` observed by the last run.
    pub fn get_output_shape(&self, index: usize) -> Result<Vec<i64>, RuntimeError> {
        self.check_output_index(index)?;
        let dims = self.last_run.as_ref().ok_or_else(|| {
            RuntimeError::OperationForbidden(
                "output shape is only known after a successful run".into(),
            )
        })?;
        dims.get(index).cloned().ok_or_else(|| {
            RuntimeError::Failed(format!("device reported no shape for output {index}"))
        })
    }

    // ── Explicit device memory ─────────────────────────────────

    /// Allocates device memory meant for input `index`.
    pub fn create_input_memory(
        &mut self,
        index: usize,
        len: usize,
    ) -> Result<MemoryRegion, RuntimeError> {
        self.check_input_index(index)?;
        let buffer = DeviceBuffer::allocate(self.plan.input_device(), len)?;
        let region = buffer.memory().clone();
        self.input_memories[index].push(buffer);
        Ok(region)
    }

    /// Releases memory created by [`create_input_memory`](Self::create_input_memory)
    /// for the same index. A slot still bound to it becomes unbound.
    pub fn destroy_input_memory(
        &mut self,
        index: usize,
        memory: &MemoryRegion,
    ) -> Result<(), RuntimeError> {
        self.check_input_index(index)?;
        let buffer = take_created(&mut self.input_memories[index], memory, "input", index)?;
        if self.inputs[index].as_ref().is_some_and(|slot| slot.uses_region(memory)) {
            self.inputs[index] = None;
            self.last_run = None;
        }
        drop(buffer);
        Ok(())
    }

    /// Allocates device memory meant for output `index`.
    pub fn create_output_memory(
        &mut self,
        index: usize,
        len: usize,
    ) -> Result<MemoryRegion, RuntimeError> {
        self.check_output_index(index)?;
        let buffer = DeviceBuffer::allocate(self.plan.output_device(), len)?;
        let region = buffer.memory().clone();
        self.output_memories[index].push(buffer);
        Ok(region)
    }

    /// Output counterpart of [`destroy_input_memory`](Self::destroy_input_memory).
    pub fn destroy_output_memory(
        &mut self,
        index: usize,
        memory: &MemoryRegion,
    ) -> Result<(), RuntimeError> {
        self.check_output_index(index)?;
        let buffer = take_created(&mut self.output_memories[index], memory, "output", index)?;
        if self.outputs[index].as_ref().is_some_and(|slot| slot.uses_region(memory)) {
            self.outputs[index] = None;
            self.last_run = None;
        }
        drop(buffer);
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    /// Runs the compiled graph once, blocking until the device returns.
    ///
    /// Every input and output must be bound. Outputs registered with
    /// [`set_output`](Self::set_output) are copied into the caller slice.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        let inputs = bound(&self.inputs, "input")?;
        let outputs = bound(&self.outputs, "output")?;

        let outcome = self.plan.run(&inputs, &outputs)?;
        if outcome.output_dims.len() != self.outputs.len()
            || outcome.buffer_sufficient.len() != self.outputs.len()
        {
            return Err(RuntimeError::Failed(format!(
                "device reported {} output shapes for {} outputs",
                outcome.output_dims.len(),
                self.outputs.len()
            )));
        }
        if let Some(index) = outcome.buffer_sufficient.iter().position(|ok| !ok) {
            return Err(RuntimeError::InvalidParameter(format!(
                "output {index}: buffer too small for result of shape {:?}",
                outcome.output_dims[index]
            )));
        }

        for (index, slot) in self.outputs.iter_mut().enumerate() {
            let Some(slot) = slot.as_mut() else { continue };
            let Some(host) = slot.host.as_deref_mut() else { continue };

            let produced = produced_bytes(&slot.desc, &outcome.output_dims[index])?;
            if produced > host.len() {
                return Err(RuntimeError::InvalidParameter(format!(
                    "output {index}: {produced} bytes produced, caller buffer holds {}",
                    host.len()
                )));
            }
            slot.backing.memory().read(0, &mut host[..produced])?;
        }

        self.last_run = Some(outcome.output_dims);
        tracing::debug!("run complete ({} inputs, {} outputs)", inputs.len(), outputs.len());
        Ok(())
    }

    // ── Validation helpers ─────────────────────────────────────

    fn check_input_index(&self, index: usize) -> Result<(), RuntimeError> {
        if index >= self.input_descs.len() {
            return Err(RuntimeError::InvalidParameter(format!(
                "input index {index} out of range (graph has {})",
                self.input_descs.len()
            )));
        }
        Ok(())
    }

    fn check_output_index(&self, index: usize) -> Result<(), RuntimeError> {
        if index >= self.output_descs.len() {
            return Err(RuntimeError::InvalidParameter(format!(
                "output index {index} out of range (graph has {})",
                self.output_descs.len()
            )));
        }
        Ok(())
    }

    /// Validates `desc` for input `index` and returns its byte size.
    fn check_input(&self, index: usize, desc: &TensorDesc) -> Result<usize, RuntimeError> {
        self.check_input_index(index)?;
        if desc.shape.is_dynamic() {
            return Err(RuntimeError::InvalidParameter(format!(
                "input {index}: shape {} must be fully resolved",
                desc.shape
            )));
        }
        desc.shape.validate()?;
        self.input_descs[index].check_compatible(desc)?;
        if let Some(ranges) = &self.dim_ranges {
            ranges
                .check(index, desc.shape.dims())
                .map_err(RuntimeError::InvalidParameter)?;
        }
        Ok(desc.byte_size()?)
    }

    /// Checks `len` against the declared size of output `index`, when the
    /// declared shape is static.
    fn check_output_capacity(&self, index: usize, len: usize) -> Result<(), RuntimeError> {
        if len == 0 {
            return Err(RuntimeError::InvalidParameter(format!(
                "output {index}: buffer length is 0"
            )));
        }
        let declared = &self.output_descs[index];
        if !declared.shape.is_dynamic() {
            let size = declared.byte_size()?;
            if len < size {
                return Err(RuntimeError::InvalidParameter(format!(
                    "output {index}: {len} bytes given, {size} needed for {}",
                    declared.shape
                )));
            }
        }
        Ok(())
    }
}

impl Executor<'static> {
    /// Runs on a blocking worker and gives up after `timeout`.
    ///
    /// The executor is handed back on success. On timeout the in-flight run
    /// keeps its executor until the device returns, then drops it.
    pub async fn run_async(mut self, timeout: Duration) -> Result<Self, RuntimeError> {
        let task = tokio::task::spawn_blocking(move || {
            self.run()?;
            Ok::<_, RuntimeError>(self)
        });
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(RuntimeError::Failed(format!("run worker failed: {join}"))),
            Err(_) => {
                tracing::warn!("asynchronous run exceeded {timeout:?}");
                Err(RuntimeError::Timeout(timeout))
            }
        }
    }
}

impl std::fmt::Debug for Executor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count =
            |slots: &[Option<TensorBuffer<'_>>]| slots.iter().filter(|s| s.is_some()).count();
        f.debug_struct("Executor")
            .field("inputs_bound", &count(&self.inputs))
            .field("outputs_bound", &count(&self.outputs))
            .field("has_run", &self.last_run.is_some())
            .finish()
    }
}

fn bound(
    slots: &[Option<TensorBuffer<'_>>],
    what: &str,
) -> Result<Vec<device_hal::IoTensor>, RuntimeError> {
    slots
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.as_ref().map(TensorBuffer::io_tensor).ok_or_else(|| {
                RuntimeError::InvalidParameter(format!("{what} {index} is not set"))
            })
        })
        .collect()
}

fn check_region(
    memory: &MemoryRegion,
    required: usize,
    what: &str,
    index: usize,
) -> Result<(), RuntimeError> {
    if memory.is_released() {
        return Err(RuntimeError::InvalidParameter(format!(
            "{what} {index}: memory region {} was released",
            memory.id()
        )));
    }
    if memory.len() < required {
        return Err(RuntimeError::InvalidParameter(format!(
            "{what} {index}: region holds {} bytes, {required} needed",
            memory.len()
        )));
    }
    Ok(())
}

fn take_created(
    created: &mut Vec<DeviceBuffer>,
    memory: &MemoryRegion,
    what: &str,
    index: usize,
) -> Result<DeviceBuffer, RuntimeError> {
    let pos = created
        .iter()
        .position(|b| b.memory().same_region(memory))
        .ok_or_else(|| {
            RuntimeError::InvalidParameter(format!(
                "memory {} was not created for {what} {index}",
                memory.id()
            ))
        })?;
    Ok(created.swap_remove(pos))
}

fn produced_bytes(desc: &TensorDesc, dims: &[i64]) -> Result<usize, RuntimeError> {
    dims.iter()
        .try_fold(desc.dtype.size_bytes(), |acc, &d| {
            usize::try_from(d).ok().and_then(|d| acc.checked_mul(d))
        })
        .ok_or_else(|| {
            RuntimeError::Failed(format!("device reported invalid output shape {dims:?}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use device_hal::{Device, DeviceManager, ReferenceDevice};
    use model_ir::{graph::Validated, ModelGraph, Node, OpType};
    use tensor_core::{DType, Shape};

    fn desc(dims: &[i64]) -> TensorDesc {
        TensorDesc::new(DType::F32, Shape::from(dims))
    }

    fn relu_graph(dims: &[i64]) -> ModelGraph<Validated> {
        ModelGraph::new(
            "relu".into(),
            vec![desc(dims), desc(dims)],
            vec![Node::new("relu", OpType::Relu, vec![0], vec![1])],
            vec![0],
            vec![1],
        )
        .validate()
        .unwrap()
    }

    fn built(graph: ModelGraph<Validated>) -> (Arc<ReferenceDevice>, Compilation) {
        let reference = Arc::new(ReferenceDevice::default());
        let manager = Arc::new(DeviceManager::new());
        let device: Arc<dyn Device> = reference.clone();
        let id = manager.register(|| Some(device)).unwrap();
        let mut compilation = Compilation::new(graph, manager);
        compilation.set_device(id).unwrap();
        compilation.build().unwrap();
        (reference, compilation)
    }

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    fn test_requires_built_compilation() {
        let manager = Arc::new(DeviceManager::new());
        let compilation = Compilation::new(relu_graph(&[2]), manager);
        assert_eq!(Executor::new(&compilation).unwrap_err().kind(), ErrorKind::OperationForbidden);
    }

    #[test]
    fn test_run_relu() {
        let (_, compilation) = built(relu_graph(&[4]));
        let mut out = [0u8; 16];
        {
            let mut exec = Executor::new(&compilation).unwrap();
            exec.set_input(0, &desc(&[4]), &f32_bytes(&[-1.0, 2.0, -3.0, 4.0])).unwrap();
            exec.set_output(0, &mut out).unwrap();
            assert!(exec.get_output_shape(0).is_err());
            exec.run().unwrap();
            assert_eq!(exec.get_output_shape(0).unwrap(), vec![4]);
        }
        assert_eq!(out.to_vec(), f32_bytes(&[0.0, 2.0, 0.0, 4.0]));
    }

    #[test]
    fn test_index_and_shape_checks() {
        let (_, compilation) = built(relu_graph(&[4]));
        let mut small = [0u8; 8];
        let mut exec = Executor::new(&compilation).unwrap();
        let data = f32_bytes(&[0.0; 4]);

        assert_eq!(
            exec.set_input(1, &desc(&[4]), &data).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(
            exec.set_input(0, &desc(&[-1]), &data).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(
            exec.set_input(0, &desc(&[5]), &data).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(
            exec.set_input(0, &desc(&[4]), &data[..8]).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
        let wrong_dtype = TensorDesc::new(DType::I32, Shape::from(&[4i64][..]));
        assert!(exec.set_input(0, &wrong_dtype, &data).is_err());

        assert!(exec.set_output(0, &mut small).is_err());
    }

    #[test]
    fn test_run_requires_all_bound() {
        let (_, compilation) = built(relu_graph(&[2]));
        let mut exec = Executor::new(&compilation).unwrap();
        exec.set_input(0, &desc(&[2]), &f32_bytes(&[1.0, 2.0])).unwrap();
        assert_eq!(exec.run().unwrap_err().kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_input_buffer_reused() {
        let (reference, compilation) = built(relu_graph(&[2]));
        let mut exec = Executor::new(&compilation).unwrap();
        exec.set_input(0, &desc(&[2]), &f32_bytes(&[1.0, 2.0])).unwrap();
        exec.set_input(0, &desc(&[2]), &f32_bytes(&[3.0, 4.0])).unwrap();
        assert_eq!(reference.memory_stats().allocations, 1);
        assert_eq!(reference.live_buffers(), 1);

        drop(exec);
        assert_eq!(reference.live_buffers(), 0);
    }

    #[test]
    fn test_shared_memory_roundtrip() {
        let (reference, compilation) = built(relu_graph(&[2]));
        let mut exec = Executor::new(&compilation).unwrap();

        let input = exec.create_input_memory(0, 8).unwrap();
        input.write(0, &f32_bytes(&[-2.0, 5.0])).unwrap();
        let output = exec.create_output_memory(0, 8).unwrap();

        exec.set_input_from_memory(0, &desc(&[2]), &input).unwrap();
        exec.set_output_from_memory(0, &output).unwrap();
        exec.run().unwrap();

        let mut raw = [0u8; 8];
        output.read(0, &mut raw).unwrap();
        assert_eq!(raw.to_vec(), f32_bytes(&[0.0, 5.0]));

        exec.destroy_input_memory(0, &input).unwrap();
        assert_eq!(exec.run().unwrap_err().kind(), ErrorKind::InvalidParameter);
        assert_eq!(reference.live_buffers(), 1);

        drop(exec);
        assert_eq!(reference.live_buffers(), 0);
        assert_eq!(reference.memory_stats().invalid_releases, 0);
    }

    #[test]
    fn test_destroy_foreign_memory_rejected() {
        let (reference, compilation) = built(relu_graph(&[2]));
        let mut exec = Executor::new(&compilation).unwrap();
        let created = exec.create_input_memory(0, 8).unwrap();
        let foreign = reference.allocate_buffer(8).unwrap();

        assert!(exec.destroy_input_memory(0, &foreign).is_err());
        assert!(exec.destroy_output_memory(0, &created).is_err());
        exec.destroy_input_memory(0, &created).unwrap();
        assert!(exec.destroy_input_memory(0, &created).is_err());
    }

    #[test]
    fn test_released_region_rejected() {
        let (_, compilation) = built(relu_graph(&[2]));
        let mut exec = Executor::new(&compilation).unwrap();
        let region = exec.create_input_memory(0, 8).unwrap();
        exec.destroy_input_memory(0, &region).unwrap();
        assert!(exec.set_input_from_memory(0, &desc(&[2]), &region).is_err());
    }

    #[test]
    fn test_produced_bytes() {
        assert_eq!(produced_bytes(&desc(&[1]), &[2, 3]).unwrap(), 24);
        assert!(produced_bytes(&desc(&[1]), &[-1]).is_err());
    }

    #[test]
    fn test_oversized_create_memory_is_an_error() {
        let (reference, compilation) = built(relu_graph(&[2]));
        let mut exec = Executor::new(&compilation).unwrap();
        let small = exec.create_input_memory(0, 8).unwrap();

        for len in [usize::MAX, usize::MAX / 2 + 1] {
            let err = exec.create_input_memory(0, len).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MemoryError);
            let err = exec.create_output_memory(0, len).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MemoryError);
        }
        assert_eq!(reference.live_buffers(), 1);
        small.write(0, &f32_bytes(&[1.0, -1.0])).unwrap();

        drop(exec);
        assert_eq!(reference.live_buffers(), 0);
        assert_eq!(reference.memory_stats().invalid_releases, 0);
    }
}
