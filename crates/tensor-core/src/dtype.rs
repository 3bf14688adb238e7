// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Supported tensor element data types.

use crate::TensorError;

/// Enumerates the numeric types an IR tensor can hold.
///
/// The runtime uses `DType` to size planner blocks and to let operator
/// implementations score themselves for a given node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 32-bit IEEE 754 floating point.
    F32,
    /// 16-bit IEEE 754 floating point.
    F16,
    /// 8-bit signed integer (quantised activations and weights).
    I8,
    /// 8-bit unsigned integer (asymmetric quantisation).
    U8,
    /// 32-bit signed integer (biases of quantised layers).
    I32,
}

impl DType {
    /// Returns the size of a single element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F16 => 2,
            DType::I8 | DType::U8 => 1,
        }
    }

    /// Returns a human-readable label for this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F16 => "f16",
            DType::I8 => "i8",
            DType::U8 => "u8",
            DType::I32 => "i32",
        }
    }

    /// Returns `true` for the 8-bit quantised types.
    pub fn is_quantized(self) -> bool {
        matches!(self, DType::I8 | DType::U8)
    }

    /// Parses a data type from its label (`"f32"`, `"int8"`, ...).
    pub fn parse(s: &str) -> Result<Self, TensorError> {
        match s.trim().to_lowercase().as_str() {
            "f32" | "fp32" | "float32" => Ok(DType::F32),
            "f16" | "fp16" | "float16" => Ok(DType::F16),
            "i8" | "int8" => Ok(DType::I8),
            "u8" | "uint8" => Ok(DType::U8),
            "i32" | "int32" => Ok(DType::I32),
            other => Err(TensorError::UnknownDType(other.to_string())),
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
