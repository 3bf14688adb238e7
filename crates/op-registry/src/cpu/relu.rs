// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! ReLU / leaky ReLU. Output 0 may overwrite input 0.

use super::{f32_at, input_dtype, store_f32};
use crate::{InplacePair, NodeContext, NodeOps, NodeStatus, OpError, Score};
use model_ir::{Graph, Node, Validated};
use tensor_core::DType;

/// `max(x, 0)` for `f32`, `max(q, zero_point)` for quantised `i8`.
///
/// A non-zero `negative_slope` gives leaky ReLU (`f32` only).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReluOps;

impl NodeOps for ReluOps {
    fn name(&self) -> &str {
        "cpu.relu"
    }

    fn score(&self, node: &Node, graph: &Graph<Validated>) -> Score {
        let slope = node.params().get_float("negative_slope").unwrap_or(0.0);
        match input_dtype(node, graph) {
            Some(DType::F32) => Score::BEST,
            Some(DType::I8) if slope == 0.0 => Score::BEST,
            _ => Score::NOT_SUPPORTED,
        }
    }

    fn inplace_map(&self, _node: &Node) -> Vec<InplacePair> {
        vec![InplacePair { output: 0, input: 0 }]
    }

    fn run(&self, ctx: &mut NodeContext<'_>) -> Result<NodeStatus, OpError> {
        let input = ctx.input_tensor(0)?;
        let slope = ctx.params().get_float("negative_slope").unwrap_or(0.0) as f32;
        let zero_point = input
            .quant()
            .and_then(|q| q.zero_points().first().copied())
            .unwrap_or(0)
            .clamp(i8::MIN as i32, i8::MAX as i32) as i8;

        ctx.copy_input_to_output(0, 0)?;
        let out = ctx.output_mut(0)?;
        match input.dtype() {
            DType::F32 => {
                for i in 0..out.len() / 4 {
                    let v = f32_at(out, i);
                    if v < 0.0 {
                        store_f32(out, i, v * slope);
                    }
                }
            }
            DType::I8 if slope == 0.0 => {
                for b in out.iter_mut() {
                    if (*b as i8) < zero_point {
                        *b = zero_point as u8;
                    }
                }
            }
            dtype => return Err(OpError::UnsupportedDType { op: "relu", dtype }),
        }
        Ok(NodeStatus::Continue)
    }
}
