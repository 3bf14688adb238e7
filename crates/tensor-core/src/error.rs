// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor metadata.

/// Errors that can occur when building tensor metadata.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// A shape was built with more dimensions than the runtime supports.
    #[error("shape has {rank} dimensions, at most {max} are supported")]
    TooManyDims { rank: usize, max: usize },

    /// The element count of a shape does not fit in `usize`.
    #[error("element count of shape {dims:?} overflows")]
    ElementOverflow { dims: Vec<usize> },

    /// Scale and zero-point vectors disagree in length.
    #[error("quantisation metadata mismatch: {scales} scales vs {zero_points} zero points")]
    QuantLengthMismatch { scales: usize, zero_points: usize },

    /// A data type name could not be parsed.
    #[error("unknown data type '{0}'")]
    UnknownDType(String),
}
