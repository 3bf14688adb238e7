// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-ir
//!
//! The in-memory intermediate representation consumed by the nnrt
//! compiler: a table of tensors and an ordered list of operator nodes.
//!
//! - [`Tensor`] — shape, dtype, kind (input / constant / variable),
//!   quantisation and producer/consumer links.
//! - [`TensorData`] — where a tensor's bytes live: graph-owned, a planned
//!   slot in the runtime's block pool, or an alias of another tensor.
//! - [`Node`] — an [`OpKind`] with version, ordered inputs and outputs, and
//!   an [`OpParams`] block.
//! - [`Graph`] — the graph, with a **type-state pattern**
//!   (`Building` → `Validated`).
//! - [`GraphLoader`] / [`GraphManifest`] — a JSON manifest loader that
//!   drives the construction calls, with constants read from a
//!   memory-mapped weights blob.
//!
//! # Example
//! ```
//! use model_ir::{Graph, OpKind, TensorKind};
//! use tensor_core::DType;
//!
//! let mut g = Graph::new("tiny");
//! let x = g.create_tensor("x", DType::F32);
//! let y = g.create_tensor("y", DType::F32);
//! g.set_tensor_kind(x, TensorKind::Input).unwrap();
//! g.set_tensor_shape(x, &[1, 16]).unwrap();
//!
//! let input = g.create_node("x", OpKind::Input, 1);
//! g.set_node_output(input, 0, x).unwrap();
//! let relu = g.create_node("relu", OpKind::Relu, 1);
//! g.set_node_input(relu, 0, x).unwrap();
//! g.set_node_output(relu, 0, y).unwrap();
//!
//! let graph = g.validate().unwrap();
//! assert_eq!(graph.tensor(x).unwrap().consumer_count(), 1);
//! ```

mod error;
pub mod graph;
mod loader;
pub mod manifest;
mod node;
mod op;
mod tensor;

pub use error::GraphError;
pub use graph::{Building, Graph, Validated};
pub use loader::GraphLoader;
pub use manifest::GraphManifest;
pub use node::{Node, NodeId};
pub use op::{OpKind, OpParams, ParamValue};
pub use tensor::{PlannedSlot, Tensor, TensorAddress, TensorData, TensorId, TensorKind};
