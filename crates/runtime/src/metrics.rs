// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-run profiling metrics.
//!
//! [`RunMetrics`] collects the duration of every executed node and the
//! wall-clock time of the whole run. Nodes skipped because an earlier node
//! suspended the run do not appear.

use model_ir::{NodeId, OpKind};
use std::time::Duration;

/// Timing of one executed node.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NodeMetrics {
    pub node: NodeId,
    pub name: String,
    pub op: OpKind,
    /// Implementation the node was bound to.
    pub implementation: String,
    /// Time spent in `reshape` and `run`.
    pub duration: Duration,
    /// Whether shape inference ran before the node.
    pub reinferred: bool,
}

/// Aggregate metrics for one `run` call.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RunMetrics {
    /// Total wall-clock time of the run.
    pub total_duration: Duration,
    /// Sum of per-node durations.
    pub compute_duration: Duration,
    pub nodes: Vec<NodeMetrics>,
    /// Bound nodes in the execution graph.
    pub num_bound: usize,
    /// Index of the node that suspended the run, if any.
    pub suspended_at: Option<NodeId>,
}

impl RunMetrics {
    /// Creates an empty metrics container.
    pub fn new(num_bound: usize) -> Self {
        Self {
            num_bound,
            ..Default::default()
        }
    }

    /// Records one executed node.
    pub fn record_node(&mut self, metrics: NodeMetrics) {
        self.compute_duration += metrics.duration;
        self.nodes.push(metrics);
    }

    /// Finalises metrics with the total wall-clock time.
    pub fn finalise(&mut self, total: Duration, suspended_at: Option<NodeId>) {
        self.total_duration = total;
        self.suspended_at = suspended_at;
    }

    /// The slowest executed node.
    pub fn slowest(&self) -> Option<&NodeMetrics> {
        self.nodes.iter().max_by_key(|n| n.duration)
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let overhead = self.total_duration.saturating_sub(self.compute_duration);
        let mut s = format!(
            "Run: {:.3}ms total, {}/{} nodes executed, {:.3}ms in nodes, {:.3}ms overhead",
            self.total_duration.as_secs_f64() * 1000.0,
            self.nodes.len(),
            self.num_bound,
            self.compute_duration.as_secs_f64() * 1000.0,
            overhead.as_secs_f64() * 1000.0,
        );
        if let Some(slowest) = self.slowest() {
            s.push_str(&format!(
                ", slowest '{}' ({:.3}ms)",
                slowest.name,
                slowest.duration.as_secs_f64() * 1000.0
            ));
        }
        if let Some(node) = self.suspended_at {
            s.push_str(&format!(", suspended at node {node}"));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(index: usize, name: &str, ms: u64) -> NodeMetrics {
        NodeMetrics {
            node: NodeId(index),
            name: name.into(),
            op: OpKind::Relu,
            implementation: "cpu.relu".into(),
            duration: Duration::from_millis(ms),
            reinferred: false,
        }
    }

    #[test]
    fn test_empty_metrics() {
        let m = RunMetrics::new(3);
        assert_eq!(m.num_bound, 3);
        assert!(m.slowest().is_none());
        assert_eq!(m.compute_duration, Duration::ZERO);
    }

    #[test]
    fn test_record_and_finalise() {
        let mut m = RunMetrics::new(2);
        m.record_node(node(1, "a", 5));
        m.record_node(node(2, "b", 8));
        m.finalise(Duration::from_millis(20), None);

        assert_eq!(m.nodes.len(), 2);
        assert_eq!(m.compute_duration, Duration::from_millis(13));
        assert_eq!(m.slowest().map(|n| n.name.as_str()), Some("b"));
    }

    #[test]
    fn test_summary_format() {
        let mut m = RunMetrics::new(4);
        m.record_node(node(1, "relu", 1));
        m.finalise(Duration::from_millis(2), Some(NodeId(2)));

        let s = m.summary();
        assert!(s.starts_with("Run:"));
        assert!(s.contains("1/4 nodes"));
        assert!(s.contains("slowest 'relu'"));
        assert!(s.contains("suspended at node"));
    }

    #[test]
    fn test_serialises() {
        let mut m = RunMetrics::new(1);
        m.record_node(node(1, "relu", 1));
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["nodes"][0]["name"], "relu");
        assert_eq!(json["num_bound"], 1);
    }
}
