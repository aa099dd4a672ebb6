// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Compiled artifact of the reference device.

use super::kernels::{binary, decode_f32, encode_f32, unary, Value};
use crate::{DeviceError, DimRanges, IoTensor, ModelConfig, PreparedModel, RunOutcome};
use model_ir::{graph::Validated, GraphLoader, ModelGraph};
use tensor_core::DType;

/// Upper bound reported for dynamic input dimensions.
const MAX_DYNAMIC_DIM: u32 = u32::MAX;

pub(crate) struct ReferencePreparedModel {
    graph: ModelGraph<Validated>,
    config: ModelConfig,
}

impl ReferencePreparedModel {
    pub(crate) fn new(graph: ModelGraph<Validated>, config: ModelConfig) -> Self {
        Self { graph, config }
    }

    fn load_input(slot: &IoTensor, index: usize) -> Result<Value, DeviceError> {
        if slot.desc.dtype != DType::F32 {
            return Err(DeviceError::InvalidParameter(format!(
                "input {index}: reference kernels need f32, got {}",
                slot.desc.dtype
            )));
        }
        let count = slot.desc.shape.num_elements().ok_or_else(|| {
            DeviceError::InvalidParameter(format!(
                "input {index}: shape {} is not resolved",
                slot.desc.shape
            ))
        })?;
        let needed = count * DType::F32.size_bytes();
        if needed > slot.length || slot.length > slot.memory.len() {
            return Err(DeviceError::InvalidParameter(format!(
                "input {index}: {needed} bytes needed, {} bound ({} capacity)",
                slot.length,
                slot.memory.len()
            )));
        }
        let data = slot.memory.with_bytes(|b| decode_f32(&b[..needed]))?;
        Ok(Value {
            dims: slot.desc.shape.dims().to_vec(),
            data,
        })
    }
}

impl PreparedModel for ReferencePreparedModel {
    fn export_cache(&self) -> Result<Vec<Vec<u8>>, DeviceError> {
        let graph = GraphLoader::to_json(&self.graph)
            .map_err(|e| DeviceError::Failed(format!("graph export: {e}")))?;
        let config = serde_json::to_vec(&self.config)
            .map_err(|e| DeviceError::Failed(format!("config export: {e}")))?;
        Ok(vec![graph.into_bytes(), config])
    }

    fn input_dim_ranges(&self) -> Result<DimRanges, DeviceError> {
        let mut ranges = DimRanges::default();
        for desc in self.graph.input_descs() {
            let (min, max): (Vec<u32>, Vec<u32>) = desc
                .shape
                .dims()
                .iter()
                .map(|&d| match u32::try_from(d) {
                    Ok(fixed) => (fixed, fixed),
                    Err(_) => (1, MAX_DYNAMIC_DIM),
                })
                .unzip();
            ranges.min.push(min);
            ranges.max.push(max);
        }
        Ok(ranges)
    }

    fn run(&self, inputs: &[IoTensor], outputs: &[IoTensor]) -> Result<RunOutcome, DeviceError> {
        let graph = &self.graph;
        if inputs.len() != graph.inputs.len() || outputs.len() != graph.outputs.len() {
            return Err(DeviceError::InvalidParameter(format!(
                "graph '{}' takes {} inputs and {} outputs, got {} and {}",
                graph.name,
                graph.inputs.len(),
                graph.outputs.len(),
                inputs.len(),
                outputs.len()
            )));
        }

        let mut values: Vec<Option<Value>> = vec![None; graph.tensors.len()];
        for (index, (slot, &tensor)) in inputs.iter().zip(&graph.inputs).enumerate() {
            values[tensor] = Some(Self::load_input(slot, index)?);
        }

        for node in graph.iter_nodes() {
            let operand = |i: usize| {
                node.inputs
                    .get(i)
                    .and_then(|&t| values[t].as_ref())
                    .ok_or_else(|| {
                        DeviceError::Failed(format!(
                            "node '{}': operand {i} not computed",
                            node.name
                        ))
                    })
            };
            let result = match node.inputs.len() {
                1 => unary(node.op, operand(0)?)?,
                2 => binary(node.op, operand(0)?, operand(1)?)?,
                n => {
                    return Err(DeviceError::InvalidParameter(format!(
                        "node '{}': {n} operands", node.name
                    )))
                }
            };
            for &out in &node.outputs {
                values[out] = Some(result.clone());
            }
        }

        let mut outcome = RunOutcome::default();
        for (slot, &tensor) in outputs.iter().zip(&graph.outputs) {
            let value = values[tensor].as_ref().ok_or_else(|| {
                DeviceError::Failed(format!("output tensor {tensor} was never produced"))
            })?;
            let bytes = encode_f32(&value.data);
            let sufficient = bytes.len() <= slot.length.min(slot.memory.len());
            if sufficient {
                slot.memory.write(0, &bytes)?;
            }
            outcome.output_dims.push(value.dims.clone());
            outcome.buffer_sufficient.push(sufficient);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::{Node, OpType};
    use tensor_core::{Shape, TensorDesc};

    #[test]
    fn test_dim_ranges_dynamic() {
        let graph = ModelGraph::new(
            "id".into(),
            vec![
                TensorDesc::new(DType::F32, Shape::new(vec![-1, 4])),
                TensorDesc::new(DType::F32, Shape::new(vec![-1, 4])),
            ],
            vec![Node::new("id", OpType::Identity, vec![0], vec![1])],
            vec![0],
            vec![1],
        )
        .validate()
        .unwrap();
        let model = ReferencePreparedModel::new(graph, ModelConfig::default());
        let ranges = model.input_dim_ranges().unwrap();
        assert_eq!(ranges.min, vec![vec![1, 4]]);
        assert_eq!(ranges.max, vec![vec![MAX_DYNAMIC_DIM, 4]]);
    }
}
