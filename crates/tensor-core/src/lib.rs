// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Leaf value types shared by every layer of the nnrt inference runtime.
//!
//! This crate provides:
//! - [`DType`] — supported element data types (f32, f16, i8, u8, i32).
//! - [`Shape`] — tensor dimensions, limited to [`MAX_DIMS`] like the
//!   microcontroller-class models the runtime targets.
//! - [`QuantParams`] — scale / zero-point metadata, per tensor or per channel.
//!
//! Nothing here owns tensor data. Buffers are owned either by the graph
//! (inputs and constants) or by the runtime's memory planner.

mod dtype;
mod error;
mod quant;
mod shape;

pub use dtype::DType;
pub use error::TensorError;
pub use quant::QuantParams;
pub use shape::{Shape, MAX_DIMS};
