// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reference CPU implementations.
//!
//! Tensors are little-endian byte buffers; these kernels decode and encode
//! elements in place without allocating.

mod relu;
mod softmax;
mod window;

pub use relu::ReluOps;
pub use softmax::SoftmaxOps;
pub use window::{MoveOps, Window};

use model_ir::{Graph, Node, Validated};
use tensor_core::DType;

fn f32_at(bytes: &[u8], index: usize) -> f32 {
    let at = index * 4;
    f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn store_f32(bytes: &mut [u8], index: usize, value: f32) {
    let at = index * 4;
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Element type of a node's first input, if it resolves.
fn input_dtype(node: &Node, graph: &Graph<Validated>) -> Option<DType> {
    let id = node.input(0)?;
    graph.tensor(id).ok().map(|t| t.dtype())
}
