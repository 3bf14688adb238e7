// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # op-registry
//!
//! Operator descriptions and their device implementations.
//!
//! Two tables meet here:
//!
//! ```text
//!   OpRegistry                         Device ("cpu", ...)
//!   (kind, version) → OpMethod         kind → [NodeOps, NodeOps, ...]
//!     defaults, shape inference          score, inplace_map, scratch_size,
//!                                        init / prerun / run / reshape /
//!                                        postrun / release
//! ```
//!
//! The compiler asks the registry for output shapes and the device for the
//! best-scoring [`NodeOps`] of every node. Neither table is global: both are
//! plain values owned by whoever builds the engine.
//!
//! # Example
//! ```
//! use model_ir::{Graph, OpKind, TensorKind};
//! use op_registry::{Device, OpRegistry};
//! use tensor_core::DType;
//!
//! let registry = OpRegistry::with_builtins();
//! let mut g = Graph::new("demo");
//! let x = g.create_tensor("x", DType::F32);
//! g.set_tensor_kind(x, TensorKind::Input).unwrap();
//! g.set_tensor_shape(x, &[1, 8]).unwrap();
//! let y = g.create_tensor("y", DType::F32);
//! let input = registry.create_node(&mut g, "x", OpKind::Input, 1).unwrap();
//! g.set_node_output(input, 0, x).unwrap();
//! let relu = registry.create_node(&mut g, "relu", OpKind::Relu, 1).unwrap();
//! g.set_node_input(relu, 0, x).unwrap();
//! g.set_node_output(relu, 0, y).unwrap();
//! let mut g = g.validate().unwrap();
//!
//! registry.infer_shape(&mut g, relu).unwrap();
//! let chosen = Device::cpu().select(g.node(relu).unwrap(), &g).unwrap();
//! assert_eq!(chosen.ops.name(), "cpu.relu");
//! ```

mod context;
pub mod cpu;
mod device;
mod error;
mod method;
mod node_ops;
mod registry;

pub use context::{NodeContext, NodeIo};
pub use device::{Device, Selection};
pub use error::{OpError, RegistryError};
pub use method::{
    builtin_methods, ConvMethod, ElementwiseMethod, FcMethod, MoveMethod, OpMethod, PoolMethod,
    ShapeQuery, SourceMethod,
};
pub use node_ops::{InplacePair, NodeOps, NodeState, NodeStatus, Score};
pub use registry::OpRegistry;
