// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Softmax along the last dimension.

use super::{f32_at, input_dtype, store_f32};
use crate::{NodeContext, NodeOps, NodeStatus, OpError, Score};
use model_ir::{Graph, Node, Validated};
use tensor_core::DType;

/// Numerically stable softmax: `exp(x - max) / sum(exp(x - max))` per row.
///
/// Reads the input while writing the output, so it never runs in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftmaxOps;

impl NodeOps for SoftmaxOps {
    fn name(&self) -> &str {
        "cpu.softmax"
    }

    fn score(&self, node: &Node, graph: &Graph<Validated>) -> Score {
        match input_dtype(node, graph) {
            Some(DType::F32) => Score::BEST,
            _ => Score::NOT_SUPPORTED,
        }
    }

    fn run(&self, ctx: &mut NodeContext<'_>) -> Result<NodeStatus, OpError> {
        let input = ctx.input_tensor(0)?;
        if input.dtype() != DType::F32 {
            return Err(OpError::UnsupportedDType {
                op: "softmax",
                dtype: input.dtype(),
            });
        }
        let row = input
            .shape()
            .and_then(|s| s.dims().last().copied())
            .unwrap_or(1);
        let (src, dst) = ctx.io(0, 0)?;
        if src.len() != dst.len() {
            return Err(OpError::Kernel {
                op: "softmax",
                detail: format!("input has {} bytes, output {}", src.len(), dst.len()),
            });
        }
        if row == 0 {
            return Ok(NodeStatus::Continue);
        }

        let total = src.len() / 4;
        for start in (0..total).step_by(row) {
            let end = (start + row).min(total);
            let max = (start..end)
                .map(|i| f32_at(src, i))
                .fold(f32::NEG_INFINITY, f32::max);

            let mut sum = 0.0f32;
            for i in start..end {
                let e = (f32_at(src, i) - max).exp();
                store_f32(dst, i, e);
                sum += e;
            }
            if sum > 0.0 {
                let inv = 1.0 / sum;
                for i in start..end {
                    store_f32(dst, i, f32_at(dst, i) * inv);
                }
            }
        }
        Ok(NodeStatus::Continue)
    }
}
