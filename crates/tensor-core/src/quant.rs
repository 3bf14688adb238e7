// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Quantisation metadata attached to IR tensors.

use crate::TensorError;

/// Affine quantisation parameters: `real = scale * (q - zero_point)`.
///
/// A single entry describes the whole tensor; more than one entry means
/// per-channel quantisation along the channel axis.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuantParams {
    scales: Vec<f32>,
    zero_points: Vec<i32>,
}

impl QuantParams {
    /// Per-tensor quantisation.
    pub fn per_tensor(scale: f32, zero_point: i32) -> Self {
        Self {
            scales: vec![scale],
            zero_points: vec![zero_point],
        }
    }

    /// Per-channel quantisation. Both vectors must have the same length.
    pub fn per_channel(scales: Vec<f32>, zero_points: Vec<i32>) -> Result<Self, TensorError> {
        if scales.len() != zero_points.len() || scales.is_empty() {
            return Err(TensorError::QuantLengthMismatch {
                scales: scales.len(),
                zero_points: zero_points.len(),
            });
        }
        Ok(Self {
            scales,
            zero_points,
        })
    }

    pub fn scales(&self) -> &[f32] {
        &self.scales
    }

    pub fn zero_points(&self) -> &[i32] {
        &self.zero_points
    }

    /// Number of quantisation channels (1 for per-tensor).
    pub fn num_channels(&self) -> usize {
        self.scales.len()
    }

    pub fn is_per_channel(&self) -> bool {
        self.scales.len() > 1
    }
}
