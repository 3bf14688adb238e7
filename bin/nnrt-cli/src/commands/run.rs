// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `nnrt run` command: compile a graph and run it on synthetic inputs.
//!
//! ```text
//! load manifest → Engine::compile → (set inputs → run) × N → outputs
//! ```

use super::{load_graph, preview, synthetic_input};
use runtime::{Engine, RunOutcome, RuntimeConfig};
use std::path::PathBuf;
use std::time::Instant;
use tensor_core::DType;

pub async fn execute(
    config: RuntimeConfig,
    graph_path: PathBuf,
    device: Option<String>,
    iterations: usize,
) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║                nnrt · Inference Runner               ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let mut graph = load_graph(&graph_path)?;
    let device = device.unwrap_or_else(|| config.device.clone());

    println!("  Config:");
    println!("   Graph:    {}", graph_path.display());
    println!("   Device:   {device}");
    println!("   Arena:    {}", if config.use_arena { config.arena_size.as_str() } else { "system" });
    println!("   Threads:  {}", config.resolve_threads());
    println!();

    let engine = Engine::new(config)?;

    // ── Compile ────────────────────────────────────────────────
    println!("  [1/2] Compiling...");
    let started = Instant::now();
    let mut exec = engine.compile(&mut graph, &device)?;
    println!("        {}", exec.summary());
    println!("        compiled in {:.3}ms", started.elapsed().as_secs_f64() * 1000.0);
    println!();

    let inputs = exec.graph().input_tensors();
    let outputs = exec.graph().output_tensors();

    // ── Run ────────────────────────────────────────────────────
    println!("  [2/2] Running {iterations} iteration(s)...");
    for step in 0..iterations {
        for &id in &inputs {
            let bytes = synthetic_input(exec.graph(), id, step)?;
            exec.set_input(id, bytes)?;
        }
        match exec.run()? {
            RunOutcome::Completed => {}
            RunOutcome::Suspended { node_index } => {
                println!("        run {step}: suspended at node {node_index}");
            }
        }
        if let Some(metrics) = exec.last_metrics() {
            tracing::info!(step, "{}", metrics.summary());
        }
    }
    println!();

    // ── Results ────────────────────────────────────────────────
    println!("  Outputs:");
    for id in outputs {
        let tensor = exec.graph().tensor(id)?;
        let name = tensor.name().to_string();
        if tensor.dtype() == DType::F32 {
            println!("   {name}: {}", preview(&exec.tensor_f32(id)?, 8));
        } else {
            println!("   {name}: {} bytes", exec.tensor_bytes(id)?.len());
        }
    }
    println!();

    if let Some(metrics) = exec.last_metrics() {
        println!("  Metrics:");
        println!("   {}", metrics.summary());
        println!();
    }

    let stats = engine.arena().stats()?;
    println!("  Arena:");
    println!("   {}", stats.summary());
    println!();
    Ok(())
}
