// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runtime configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! arena_size = "32M"
//! min_order = 4
//! max_order = 24
//! use_arena = true
//! block_align = 16
//! num_threads = 4
//! device = "cpu"
//! enable_profiling = true
//! ```
//!
//! Every key is optional; missing keys take the [`Default`] values.

use crate::RuntimeError;
use arena_alloc::{ArenaConfig, MemoryBudget};
use std::path::Path;

/// Configuration for the inference runtime.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Arena capacity (human-readable, e.g. `"32M"`).
    pub arena_size: String,
    /// Smallest buddy block order.
    pub min_order: u32,
    /// Largest buddy block order.
    pub max_order: u32,
    /// When false, tensor storage comes from the system heap.
    pub use_arena: bool,
    /// Alignment of every planned tensor inside its block.
    pub block_align: usize,
    /// Thread hint for operator implementations (defaults to the number of
    /// online CPU cores).
    pub num_threads: Option<usize>,
    /// Device graphs are compiled for.
    pub device: String,
    /// Whether to collect per-node timings.
    pub enable_profiling: bool,
}

impl RuntimeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| RuntimeError::Config(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::Config(format!("TOML serialise error: {e}")))
    }

    /// Parses the arena size into a [`MemoryBudget`].
    pub fn parse_budget(&self) -> Result<MemoryBudget, RuntimeError> {
        MemoryBudget::parse(&self.arena_size)
            .map_err(|e| RuntimeError::Config(format!("invalid arena size: {e}")))
    }

    /// The buddy order bounds.
    pub fn arena_config(&self) -> Result<ArenaConfig, RuntimeError> {
        ArenaConfig::new(self.min_order, self.max_order)
            .map_err(|e| RuntimeError::Config(e.to_string()))
    }

    /// Resolves the number of worker threads.
    pub fn resolve_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    /// Checks every value that can be checked without allocating.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        self.arena_config()?;
        if self.use_arena {
            self.parse_budget()?;
        }
        if !self.block_align.is_power_of_two() {
            return Err(RuntimeError::Config(format!(
                "block_align {} is not a power of two",
                self.block_align
            )));
        }
        if self.num_threads == Some(0) {
            return Err(RuntimeError::Config("num_threads must be at least 1".into()));
        }
        if self.device.trim().is_empty() {
            return Err(RuntimeError::Config("device name is empty".into()));
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let orders = ArenaConfig::default();
        Self {
            arena_size: "32M".to_string(),
            min_order: orders.min_order,
            max_order: orders.max_order,
            use_arena: true,
            block_align: 16,
            num_threads: None,
            device: "cpu".to_string(),
            enable_profiling: true,
        }
    }
}
