// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommands and the helpers they share.

pub mod arena;
pub mod inspect;
pub mod run;
pub mod stream;

use anyhow::Context;
use model_ir::{Graph, GraphLoader, TensorId, Validated};
use runtime::RuntimeConfig;
use std::path::Path;
use tensor_core::DType;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Reads the configuration file, or the defaults without one.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("failed to load config '{}'", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

/// Loads and validates a graph manifest.
pub fn load_graph(path: &Path) -> anyhow::Result<Graph<Validated>> {
    GraphLoader::load(path).with_context(|| format!("failed to load graph '{}'", path.display()))
}

/// Deterministic input bytes for a tensor; `step` varies them between runs.
pub fn synthetic_input(graph: &Graph<Validated>, id: TensorId, step: usize) -> anyhow::Result<Vec<u8>> {
    let tensor = graph.tensor(id)?;
    let bytes = match tensor.dtype() {
        DType::F32 => {
            let n = tensor.byte_size() / 4;
            (0..n)
                .map(|i| ((i + step * 7) as f32 * 0.37).sin())
                .flat_map(f32::to_le_bytes)
                .collect()
        }
        _ => (0..tensor.byte_size())
            .map(|i| ((i + step) % 251) as u8)
            .collect(),
    };
    Ok(bytes)
}

/// First few values of an `f32` tensor, for display.
pub fn preview(values: &[f32], max: usize) -> String {
    let shown: Vec<String> = values.iter().take(max).map(|v| format!("{v:.4}")).collect();
    let more = if values.len() > max { ", ..." } else { "" };
    format!("[{}{more}]", shown.join(", "))
}

/// Truncates a string to `max_len` with ellipsis if needed.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("relu", 10), "relu");
        assert_eq!(truncate("a_very_long_tensor_name", 10), "a_very_...");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview(&[1.0, 2.0], 4), "[1.0000, 2.0000]");
        assert_eq!(preview(&[1.0, 2.0, 3.0], 2), "[1.0000, 2.0000, ...]");
    }
}
