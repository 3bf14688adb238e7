// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `nnrt inspect` command: display a graph and its memory plan.
//!
//! Loads the manifest, compiles it on the chosen device and prints the
//! tensor table with consumer counts, the bound nodes and every block and
//! alias the planner decided on.

use super::{load_graph, truncate};
use runtime::{BlockAssignment, Engine, RuntimeConfig};
use std::path::PathBuf;

pub async fn execute(
    config: RuntimeConfig,
    graph_path: PathBuf,
    device: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let mut graph = load_graph(&graph_path)?;
    let device = device.unwrap_or_else(|| config.device.clone());
    let engine = Engine::new(config)?;
    let exec = engine.compile(&mut graph, &device)?;
    let graph = exec.graph();

    if json {
        println!("{}", serde_json::to_string_pretty(exec.plan())?);
        return Ok(());
    }

    println!("╔══════════════════════════════════════════════════════╗");
    println!("║                nnrt · Graph Inspector                ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
    println!("  {}", graph.summary());
    println!("  {}", exec.summary());
    println!();

    // ── Tensors ────────────────────────────────────────────────
    println!(
        "  {:<4} {:<28} {:<6} {:<16} {:<9} {:>9} {:>5}",
        "Id", "Tensor", "DType", "Shape", "Kind", "Bytes", "Cons",
    );
    println!("  {}", "-".repeat(84));
    for t in graph.tensors() {
        let shape = t.shape().map(|s| s.to_string()).unwrap_or_else(|| "?".into());
        println!(
            "  {:<4} {:<28} {:<6} {:<16} {:<9} {:>9} {:>5}",
            t.id().to_string(),
            truncate(t.name(), 28),
            t.dtype().to_string(),
            truncate(&shape, 16),
            format!("{:?}", t.kind()).to_lowercase(),
            t.byte_size(),
            t.consumer_count(),
        );
    }
    println!();

    // ── Bound nodes ────────────────────────────────────────────
    println!(
        "  {:<4} {:<24} {:<8} {:<16} {:>6} {:>8}",
        "Node", "Name", "Op", "Impl", "Score", "Scratch",
    );
    println!("  {}", "-".repeat(72));
    for bound in exec.bound_nodes() {
        println!(
            "  {:<4} {:<24} {:<8} {:<16} {:>6} {:>8}",
            bound.node().to_string(),
            truncate(bound.name(), 24),
            bound.op().to_string(),
            truncate(bound.implementation(), 16),
            bound.score().to_string(),
            bound.scratch_size(),
        );
    }
    println!();

    // ── Memory plan ────────────────────────────────────────────
    let plan = exec.plan();
    println!("  Blocks:");
    for (id, block) in plan.blocks().iter().enumerate() {
        println!(
            "   #{id:<3} {:>9} bytes  ({} requests)",
            block.max_size, block.alloc_count,
        );
    }
    println!("  Outputs:");
    for node in plan.nodes() {
        for output in &node.outputs {
            let name = graph.tensor(output.tensor)?.name();
            let placement = match output.assignment {
                Some(BlockAssignment::Owned(block)) => format!("block #{block}"),
                Some(BlockAssignment::Aliased(slot)) => {
                    let source = graph
                        .node(node.node)?
                        .input(slot)
                        .map(|t| graph.tensor(t).map(|t| t.name().to_string()))
                        .transpose()?
                        .unwrap_or_else(|| "?".into());
                    format!("in place over '{source}'")
                }
                None => "external buffer".into(),
            };
            println!("   {:<28} {:>9} bytes  {placement}", truncate(name, 28), output.size);
        }
    }
    println!();
    println!("  {}", plan.summary());
    println!();
    Ok(())
}
