// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: graph construction → compile → plan → run.
//!
//! These tests drive the whole engine through its public API, with the
//! reference CPU device and with a test device whose operator records
//! every hook call and checks the bytes it reads.

use arena_alloc::{Arena, ArenaConfig, ArenaError, MemoryBudget};
use model_ir::{Building, Graph, GraphError, NodeId, OpKind, OpParams, TensorAddress, TensorData, TensorId, TensorKind, Validated};
use op_registry::{Device, NodeContext, NodeOps, NodeState, NodeStatus, OpError, OpMethod, Score, ShapeQuery};
use proptest::prelude::*;
use runtime::{BlockAssignment, Engine, Phase, RunOutcome, RuntimeConfig, RuntimeError};
use std::sync::{Arc, Mutex};
use tensor_core::{DType, Shape};

// ── Helpers ────────────────────────────────────────────────────────

type Events = Arc<Mutex<Vec<String>>>;

/// Fill value every writer of `tensor` uses.
fn fill_of(tensor: TensorId) -> u8 {
    (tensor.index() % 250 + 1) as u8
}

/// Checks that every input still holds its producer's fill value, then
/// fills its own output. Logs each hook as `hook:node`.
///
/// With `fail` set to `(hook, node)`, that hook returns an error for that
/// node. `init` and `prerun` log before failing; a failed `run` logs nothing.
struct FillOps {
    events: Events,
    fail: Option<(&'static str, &'static str)>,
}

impl FillOps {
    fn new(events: &Events) -> Self {
        Self {
            events: Arc::clone(events),
            fail: None,
        }
    }

    fn failing(events: &Events, hook: &'static str, node: &'static str) -> Self {
        Self {
            events: Arc::clone(events),
            fail: Some((hook, node)),
        }
    }

    fn log(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn check(&self, hook: &'static str, node: &str) -> Result<(), OpError> {
        self.log(format!("{hook}:{node}"));
        match self.fail {
            Some((h, n)) if h == hook && n == node => Err(OpError::Kernel {
                op: "test.fill",
                detail: format!("{hook} refused"),
            }),
            _ => Ok(()),
        }
    }
}

impl NodeOps for FillOps {
    fn name(&self) -> &str {
        "test.fill"
    }

    fn score(&self, _node: &model_ir::Node, _graph: &Graph<Validated>) -> Score {
        Score::BEST
    }

    fn init(&self, node: &model_ir::Node, _graph: &Graph<Validated>) -> Result<Option<NodeState>, OpError> {
        self.check("init", node.name())?;
        Ok(Some(Box::new(node.name().to_string())))
    }

    fn prerun(&self, ctx: &mut NodeContext<'_>) -> Result<(), OpError> {
        self.check("prerun", ctx.node().name())
    }

    fn run(&self, ctx: &mut NodeContext<'_>) -> Result<NodeStatus, OpError> {
        let node = ctx.node();
        if self.fail == Some(("run", node.name())) {
            return Err(OpError::Kernel {
                op: "test.fill",
                detail: "run refused".into(),
            });
        }
        let expected: Vec<u8> = node.inputs().iter().map(|t| fill_of(*t)).collect();
        let own = fill_of(node.outputs()[0]);
        let (inputs, out) = ctx.inputs_and_output(0)?;
        for (slot, (bytes, want)) in inputs.iter().zip(&expected).enumerate() {
            if bytes.iter().any(|b| b != want) {
                self.log(format!("corrupt:{}:{slot}", node.name()));
            }
        }
        out.fill(own);
        self.log(format!("run:{}", node.name()));
        Ok(NodeStatus::Continue)
    }

    fn postrun(&self, ctx: &mut NodeContext<'_>) -> Result<(), OpError> {
        self.log(format!("postrun:{}", ctx.node().name()));
        Ok(())
    }

    fn release(&self, state: Option<NodeState>) {
        if let Some(name) = state.and_then(|s| s.downcast::<String>().ok()) {
            self.log(format!("release:{name}"));
        }
    }
}

fn fill_device(events: &Events) -> Device {
    Device::cpu().with(OpKind::Generic, Arc::new(FillOps::new(events)))
}

fn events_with(events: &Events, prefix: &str) -> Vec<String> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
        .collect()
}

/// Small graph builder over `Graph<Building>`.
struct Builder {
    graph: Graph<Building>,
}

impl Builder {
    fn new(name: &str) -> Self {
        Self {
            graph: Graph::new(name),
        }
    }

    fn input(&mut self, name: &str, dims: &[usize]) -> TensorId {
        let t = self.graph.create_tensor(name, DType::F32);
        self.graph.set_tensor_kind(t, TensorKind::Input).unwrap();
        self.graph.set_tensor_shape(t, dims).unwrap();
        let n = self.graph.create_node(format!("{name}_in"), OpKind::Input, 1);
        self.graph.set_node_output(n, 0, t).unwrap();
        t
    }

    fn op(&mut self, name: &str, op: OpKind, inputs: &[TensorId], dims: Option<&[usize]>) -> TensorId {
        let t = self.graph.create_tensor(format!("{name}_out"), DType::F32);
        if let Some(dims) = dims {
            self.graph.set_tensor_shape(t, dims).unwrap();
        }
        let n = self.graph.create_node(name, op, 1);
        for (slot, &input) in inputs.iter().enumerate() {
            self.graph.set_node_input(n, slot, input).unwrap();
        }
        self.graph.set_node_output(n, 0, t).unwrap();
        t
    }

    fn node(&self, name: &str) -> NodeId {
        self.graph.find_node(name).unwrap()
    }

    fn finish(self) -> Graph<Validated> {
        self.graph.validate().unwrap()
    }
}

fn engine() -> Engine {
    Engine::new(RuntimeConfig::default()).unwrap()
}

/// Input → relu → softmax → relu, optionally with a second reader of the input.
fn relu_softmax_chain(shared_input: bool) -> (Graph<Validated>, TensorId, TensorId) {
    let mut b = Builder::new("chain");
    let x = b.input("x", &[1, 4]);
    let a = b.op("op_a", OpKind::Relu, &[x], None);
    let s = b.op("op_b", OpKind::Softmax, &[a], None);
    let out = b.op("output", OpKind::Relu, &[s], None);
    if shared_input {
        b.op("branch", OpKind::Softmax, &[x], None);
    }
    (b.finish(), x, out)
}

// ── Execution order ────────────────────────────────────────────────

#[test]
fn test_every_node_runs_once_in_order() {
    let events = Events::default();
    let device = fill_device(&events);
    let mut b = Builder::new("order");
    let x = b.input("x", &[1, 8]);
    let g1 = b.op("g1", OpKind::Generic, &[x], Some(&[1, 8]));
    let g2 = b.op("g2", OpKind::Generic, &[g1], Some(&[1, 4]));
    let g3 = b.op("g3", OpKind::Generic, &[x, g2], Some(&[1, 8]));
    b.op("g4", OpKind::Generic, &[g3, g1], Some(&[1, 2]));
    let mut graph = b.finish();

    let engine = engine();
    let mut exec = engine.compile_on(&mut graph, &device).unwrap();
    exec.set_input(x, vec![fill_of(x); 32]).unwrap();

    for _ in 0..2 {
        assert_eq!(exec.run().unwrap(), RunOutcome::Completed);
    }
    assert_eq!(
        events_with(&events, "run:"),
        vec!["g1", "g2", "g3", "g4", "g1", "g2", "g3", "g4"]
    );
    assert!(events_with(&events, "corrupt:").is_empty());

    let metrics = exec.last_metrics().unwrap();
    assert_eq!(metrics.nodes.len(), 4);
    assert_eq!(metrics.num_bound, 4);
}

#[test]
fn test_lifecycle_hooks() {
    let events = Events::default();
    let device = fill_device(&events);
    let mut b = Builder::new("hooks");
    let x = b.input("x", &[1, 2]);
    b.op("g", OpKind::Generic, &[x], Some(&[1, 2]));
    let mut graph = b.finish();

    let engine = engine();
    {
        let mut exec = engine.compile_on(&mut graph, &device).unwrap();
        exec.set_input(x, vec![fill_of(x); 8]).unwrap();
        exec.run().unwrap();
    }
    let log = events.lock().unwrap().clone();
    assert_eq!(log, vec!["init:g", "prerun:g", "run:g", "postrun:g", "release:g"]);
}

#[test]
fn test_failed_compile_releases_bound_nodes() {
    let events = Events::default();
    let device = Device::new("partial").with(OpKind::Generic, Arc::new(FillOps::new(&events)));
    let mut b = Builder::new("partial");
    let x = b.input("x", &[1, 4]);
    let g = b.op("g", OpKind::Generic, &[x], Some(&[1, 4]));
    b.op("relu", OpKind::Relu, &[g], None);
    let mut graph = b.finish();

    let err = engine().compile_on(&mut graph, &device).unwrap_err();
    assert!(err.is_compile_failure());
    assert!(matches!(err, RuntimeError::NoImplementation { op: OpKind::Relu, .. }));
    assert_eq!(events_with(&events, "release:"), vec!["g"]);
    assert!(events_with(&events, "prerun:").is_empty());
    assert!(graph.tensors().iter().all(|t| !matches!(
        graph.data(t.id()).unwrap(),
        TensorData::Planned(_) | TensorData::Alias(_)
    )));
}

/// x → g1 → g2 → g3, all on the fill operator.
fn generic_chain() -> (Graph<Validated>, TensorId) {
    let mut b = Builder::new("generic");
    let x = b.input("x", &[1, 4]);
    let g1 = b.op("g1", OpKind::Generic, &[x], Some(&[1, 4]));
    let g2 = b.op("g2", OpKind::Generic, &[g1], Some(&[1, 4]));
    b.op("g3", OpKind::Generic, &[g2], Some(&[1, 4]));
    (b.finish(), x)
}

#[test]
fn test_failed_init_releases_earlier_nodes() {
    let events = Events::default();
    let device = Device::cpu().with(OpKind::Generic, Arc::new(FillOps::failing(&events, "init", "g2")));
    let (mut graph, _) = generic_chain();

    let err = engine().compile_on(&mut graph, &device).unwrap_err();
    assert!(err.is_compile_failure());
    assert!(matches!(err, RuntimeError::NodeInit { ref node, .. } if node == "g2"));
    assert_eq!(events_with(&events, "init:"), vec!["g1", "g2"]);
    assert_eq!(events_with(&events, "release:"), vec!["g1"]);
    assert!(events_with(&events, "prerun:").is_empty());
}

#[test]
fn test_failed_prerun_aborts_compile() {
    let events = Events::default();
    let device = Device::cpu().with(OpKind::Generic, Arc::new(FillOps::failing(&events, "prerun", "g2")));
    let (mut graph, _) = generic_chain();

    let err = engine().compile_on(&mut graph, &device).unwrap_err();
    assert!(err.is_compile_failure());
    assert!(matches!(err, RuntimeError::NodePrerun { ref node, .. } if node == "g2"));
    assert_eq!(events_with(&events, "prerun:"), vec!["g1", "g2"]);
    assert!(events_with(&events, "postrun:").is_empty());
    assert_eq!(events_with(&events, "release:"), vec!["g1", "g2", "g3"]);
    assert!(graph.tensors().iter().all(|t| !matches!(
        graph.data(t.id()).unwrap(),
        TensorData::Planned(_) | TensorData::Alias(_)
    )));
}

#[test]
fn test_failed_run_reports_node_index() {
    let events = Events::default();
    let device = Device::cpu().with(OpKind::Generic, Arc::new(FillOps::failing(&events, "run", "g2")));
    let (mut graph, x) = generic_chain();

    let engine = engine();
    let mut exec = engine.compile_on(&mut graph, &device).unwrap();
    exec.set_input(x, vec![fill_of(x); 16]).unwrap();

    let err = exec.run().unwrap_err();
    assert!(!err.is_compile_failure());
    assert!(matches!(err, RuntimeError::NodeFailed { ref node, .. } if node == "g2"));
    assert_eq!(err.node_index(), exec.graph().find_node("g2"));
    assert_eq!(events_with(&events, "run:"), vec!["g1"]);
}

#[test]
fn test_missing_input_reports_node_index() {
    let mut b = Builder::new("unfed");
    let x = b.input("x", &[1, 4]);
    b.op("softmax", OpKind::Softmax, &[x], None);
    let mut graph = b.finish();

    let engine = engine();
    let mut exec = engine.compile(&mut graph, "cpu").unwrap();
    let err = exec.run().unwrap_err();
    assert!(!err.is_compile_failure());
    assert_eq!(err.node_index(), exec.graph().find_node("softmax"));
    match err {
        RuntimeError::NodeStorage { source, .. } => {
            assert!(matches!(*source, RuntimeError::MissingData { ref tensor } if tensor == "x"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ── Use after reuse ────────────────────────────────────────────────

#[test]
fn test_reused_blocks_hold_their_writers_values() {
    let events = Events::default();
    let device = fill_device(&events);

    // Diamond plus a long-lived tensor that spans several reuse cycles.
    let mut b = Builder::new("diamond");
    let x = b.input("x", &[1, 16]);
    let keep = b.op("keep", OpKind::Generic, &[x], Some(&[1, 16]));
    let l = b.op("left", OpKind::Generic, &[x], Some(&[1, 8]));
    let r = b.op("right", OpKind::Generic, &[x], Some(&[1, 16]));
    let j = b.op("join", OpKind::Generic, &[l, r], Some(&[1, 4]));
    let k = b.op("again", OpKind::Generic, &[j], Some(&[1, 16]));
    let m = b.op("more", OpKind::Generic, &[k], Some(&[1, 2]));
    b.op("last", OpKind::Generic, &[m, keep], Some(&[1, 16]));
    let mut graph = b.finish();

    let engine = engine();
    let mut exec = engine.compile_on(&mut graph, &device).unwrap();
    assert!(exec.plan().num_blocks() < 7);

    exec.set_input(x, vec![fill_of(x); 64]).unwrap();
    exec.run().unwrap();
    assert_eq!(events_with(&events, "run:").len(), 7);
    assert!(
        events_with(&events, "corrupt:").is_empty(),
        "corrupted reads: {:?}",
        events_with(&events, "corrupt:")
    );
}

// ── Reference liveness ─────────────────────────────────────────────

/// Maximum number of operator outputs alive at once, where an output lives
/// from its producer to its last consumer, or to the end if nobody reads it.
fn reference_liveness(graph: &Graph<Validated>) -> usize {
    let order: Vec<&model_ir::Node> = graph.nodes().iter().filter(|n| !n.op().is_source()).collect();
    let step_of = |id: NodeId| order.iter().position(|n| n.id() == id);

    let mut intervals = Vec::new();
    for (step, node) in order.iter().enumerate() {
        for &out in node.outputs() {
            let tensor = graph.tensor(out).unwrap();
            let end = tensor
                .consumers()
                .iter()
                .filter_map(|c| step_of(*c))
                .max()
                .unwrap_or(order.len());
            intervals.push((step, end.max(step)));
        }
    }
    (0..order.len())
        .map(|step| intervals.iter().filter(|(s, e)| *s <= step && step <= *e).count())
        .max()
        .unwrap_or(0)
}

/// Random DAG: each node picks up to three earlier tensors as inputs.
fn random_graph(layers: &[(usize, Vec<prop::sample::Index>)]) -> (Graph<Validated>, TensorId) {
    let mut b = Builder::new("random");
    let x = b.input("x", &[1, 8]);
    let mut tensors = vec![x];
    for (i, (width, picks)) in layers.iter().enumerate() {
        let mut inputs: Vec<TensorId> = picks.iter().map(|p| *p.get(&tensors)).collect();
        inputs.sort();
        inputs.dedup();
        let out = b.op(&format!("n{i}"), OpKind::Generic, &inputs, Some(&[1, *width]));
        tensors.push(out);
    }
    (b.finish(), x)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_blocks_bounded_by_liveness(
        layers in prop::collection::vec(
            (1usize..16, prop::collection::vec(any::<prop::sample::Index>(), 1..4)),
            1..12,
        )
    ) {
        let events = Events::default();
        let device = fill_device(&events);
        let (mut graph, x) = random_graph(&layers);
        let bound = reference_liveness(&graph);

        let engine = engine();
        let mut exec = engine.compile_on(&mut graph, &device).unwrap();
        prop_assert!(exec.plan().num_blocks() <= bound);

        exec.set_input(x, vec![fill_of(x); 32]).unwrap();
        exec.run().unwrap();
        prop_assert!(events_with(&events, "corrupt:").is_empty());
        prop_assert_eq!(events_with(&events, "run:").len(), layers.len());
    }
}

// ── In-place aliasing ──────────────────────────────────────────────

#[test]
fn test_inplace_output_shares_input_address() {
    let events = Events::default();
    let device = fill_device(&events);
    let mut b = Builder::new("inplace");
    let x = b.input("x", &[1, 4]);
    let g = b.op("g", OpKind::Generic, &[x], Some(&[1, 4]));
    let y = b.op("relu", OpKind::Relu, &[g], None);
    b.op("softmax", OpKind::Softmax, &[y], None);
    let mut graph = b.finish();

    let engine = engine();
    let exec = engine.compile_on(&mut graph, &device).unwrap();
    let relu = exec.graph().find_node("relu").unwrap();
    let plan = exec
        .plan()
        .nodes()
        .iter()
        .find(|n| n.node == relu)
        .unwrap();
    assert_eq!(plan.outputs[0].assignment, Some(BlockAssignment::Aliased(0)));

    let source = exec.graph().address(g).unwrap();
    assert!(matches!(source, Some(TensorAddress::Planned(_))));
    assert_eq!(exec.graph().address(y).unwrap(), source);
}

#[test]
fn test_inplace_on_supplied_input() {
    let (mut graph, x, out) = relu_softmax_chain(false);
    graph.set_input_data(x, [-1.0f32, 0.5, 2.0, -3.0].iter().flat_map(|v| v.to_le_bytes()).collect()).unwrap();
    let a = graph.find_tensor("op_a_out").unwrap();

    let engine = engine();
    let mut exec = engine.compile(&mut graph, "cpu").unwrap();
    assert_eq!(exec.graph().address(a).unwrap(), Some(TensorAddress::External(x)));
    assert_eq!(exec.graph().address(x).unwrap(), Some(TensorAddress::External(x)));

    exec.run().unwrap();
    let relu: Vec<f32> = exec.tensor_f32(a).unwrap();
    assert_eq!(relu, vec![0.0, 0.5, 2.0, 0.0]);
    // The input buffer was overwritten in place.
    assert_eq!(exec.tensor_f32(x).unwrap(), relu);

    let probs = exec.tensor_f32(out).unwrap();
    assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
}

// ── Chain scenario ─────────────────────────────────────────────────

#[test]
fn test_chain_uses_one_block() {
    let (mut graph, _, _) = relu_softmax_chain(false);
    let engine = engine();
    let exec = engine.compile(&mut graph, "cpu").unwrap();
    assert_eq!(exec.plan().num_blocks(), 1);
    assert_eq!(exec.bound_nodes().len(), 3);
}

#[test]
fn test_shared_input_needs_two_blocks() {
    let (mut graph, _, _) = relu_softmax_chain(true);
    let engine = engine();
    let exec = engine.compile(&mut graph, "cpu").unwrap();
    assert_eq!(exec.plan().num_blocks(), 2);

    let a = exec.graph().find_tensor("op_a_out").unwrap();
    assert_eq!(exec.plan().assignment(a), Some(BlockAssignment::Owned(0)));
}

// ── Allocator bounds ───────────────────────────────────────────────

#[test]
fn test_arena_order_bounds() {
    let arena = Arena::new(MemoryBudget::from_kb(64), ArenaConfig::new(4, 12).unwrap()).unwrap();

    let small = arena.alloc(1).unwrap();
    let offset = small.offset().unwrap();
    let entry = arena.lock().unwrap().allocation(offset).unwrap();
    assert_eq!(entry.block_size(), 16);

    let err = arena.alloc((1 << 12) + 1).unwrap_err();
    assert!(matches!(err, ArenaError::OrderTooLarge { max_order: 12, .. }));
    let again = arena.alloc((1 << 12) + 1).unwrap_err();
    assert!(matches!(again, ArenaError::OrderTooLarge { max_order: 12, .. }));
}

#[test]
fn test_oversized_tensor_fails_compile() {
    let config = RuntimeConfig {
        arena_size: "64K".into(),
        max_order: 12,
        ..Default::default()
    };
    let engine = Engine::new(config).unwrap();
    let mut b = Builder::new("big");
    let x = b.input("x", &[1, 4096]);
    b.op("softmax", OpKind::Softmax, &[x], None);
    let mut graph = b.finish();

    let err = engine.compile(&mut graph, "cpu").unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Allocation(ArenaError::OrderTooLarge { .. })
    ));
}

// ── Suspend ────────────────────────────────────────────────────────

#[test]
fn test_window_suspends_until_full() {
    let mut b = Builder::new("stream");
    let x = b.input("x", &[1, 1, 2]);
    let w = b.op("window", OpKind::Move, &[x], None);
    let y = b.op("relu", OpKind::Relu, &[w], None);
    let window = b.node("window");
    b.graph
        .set_node_params(window, OpParams::new().with("window", 3usize))
        .unwrap();
    let mut graph = b.finish();

    let engine = engine();
    let mut exec = engine.compile(&mut graph, "cpu").unwrap();
    let window = exec.graph().find_node("window").unwrap();

    let chunks = [[1.0f32, -1.0], [2.0, -2.0], [3.0, -3.0]];
    for (i, chunk) in chunks.iter().enumerate() {
        exec.set_input_f32(x, chunk).unwrap();
        let outcome = exec.run().unwrap();
        if i < 2 {
            assert_eq!(outcome, RunOutcome::Suspended { node_index: window });
            assert_eq!(exec.last_metrics().unwrap().suspended_at, Some(window));
        } else {
            assert!(outcome.is_completed());
        }
    }
    assert_eq!(exec.tensor_f32(y).unwrap(), vec![1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
}

// ── Dynamic shapes ─────────────────────────────────────────────────

fn dynamic_softmax() -> (Graph<Validated>, TensorId, TensorId) {
    let mut b = Builder::new("dynamic");
    let x = b.input("x", &[1, 4]);
    let y = b.op("softmax", OpKind::Softmax, &[x], None);
    let node = b.node("softmax");
    b.graph.set_node_dynamic(node, true).unwrap();
    (b.finish(), x, y)
}

#[test]
fn test_dynamic_node_shrinks() {
    let (mut graph, x, y) = dynamic_softmax();
    let engine = engine();
    let mut exec = engine.compile(&mut graph, "cpu").unwrap();

    assert!(exec.resize_input(x, Shape::matrix(1, 2)).unwrap());
    exec.set_input_f32(x, &[0.0, 0.0]).unwrap();
    exec.run().unwrap();
    assert_eq!(exec.tensor_f32(y).unwrap(), vec![0.5, 0.5]);
    assert!(exec.last_metrics().unwrap().nodes[0].reinferred);
}

#[test]
fn test_dynamic_node_outgrowing_storage_fails() {
    let (mut graph, x, _) = dynamic_softmax();
    let engine = engine();
    let mut exec = engine.compile(&mut graph, "cpu").unwrap();

    exec.resize_input(x, Shape::matrix(1, 64)).unwrap();
    exec.set_input_f32(x, &[0.0; 64]).unwrap();
    let err = exec.run().unwrap_err();
    assert!(!err.is_compile_failure());
    assert!(matches!(err, RuntimeError::ShapeMismatch { phase: Phase::Run, .. }));
    assert_eq!(err.node_index(), exec.graph().find_node("softmax"));
}

/// Keeps the input shape, but refuses inputs wider than four elements.
struct NarrowMethod;

impl OpMethod for NarrowMethod {
    fn kind(&self) -> OpKind {
        OpKind::Generic
    }

    fn infer_shape(&self, query: &ShapeQuery<'_>) -> Result<Vec<Shape>, OpError> {
        let shape = query.input_shape(0)?;
        if shape.dims().last().copied().unwrap_or(0) > 4 {
            return Err(OpError::Shape {
                op: OpKind::Generic,
                detail: format!("{shape} is wider than 4"),
            });
        }
        Ok(vec![shape.clone()])
    }

    fn is_dynamic(&self) -> bool {
        true
    }
}

#[test]
fn test_failed_inference_keeps_shapes_and_runs() {
    let events = Events::default();
    let device = fill_device(&events);
    let mut b = Builder::new("narrow");
    let x = b.input("x", &[1, 4]);
    let g = b.op("g", OpKind::Generic, &[x], None);
    let mut graph = b.finish();

    let mut engine = engine();
    engine.registry_mut().unregister(OpKind::Generic, 1);
    engine.registry_mut().register(Arc::new(NarrowMethod)).unwrap();
    let mut exec = engine.compile_on(&mut graph, &device).unwrap();
    assert!(exec.graph().node(exec.graph().find_node("g").unwrap()).unwrap().is_dynamic());

    exec.resize_input(x, Shape::matrix(1, 8)).unwrap();
    exec.set_input(x, vec![fill_of(x); 32]).unwrap();
    assert!(exec.run().unwrap().is_completed());

    assert_eq!(events_with(&events, "run:"), vec!["g"]);
    assert!(events_with(&events, "corrupt:").is_empty());
    assert_eq!(exec.graph().tensor(g).unwrap().shape(), Some(&Shape::matrix(1, 4)));
    assert_eq!(exec.tensor_bytes(g).unwrap(), vec![fill_of(g); 16]);
    assert!(exec.last_metrics().unwrap().nodes[0].reinferred);
}

#[test]
fn test_resize_rejects_variables() {
    let (mut graph, _, y) = dynamic_softmax();
    let engine = engine();
    let mut exec = engine.compile(&mut graph, "cpu").unwrap();
    let err = exec.resize_input(y, Shape::matrix(1, 2)).unwrap_err();
    assert!(matches!(err, RuntimeError::Graph(GraphError::InvalidTensor { .. })));
}

// ── Teardown ───────────────────────────────────────────────────────

#[test]
fn test_drop_returns_storage() {
    let (mut graph, _, out) = relu_softmax_chain(true);
    let engine = engine();
    {
        let exec = engine.compile(&mut graph, "cpu").unwrap();
        assert!(exec.graph().address(out).unwrap().is_some());
        assert!(engine.arena().lock().unwrap().live_allocations() > 0);
    }
    assert_eq!(engine.arena().lock().unwrap().live_allocations(), 0);
    assert!(graph.data(out).unwrap().is_unassigned());

    // The same graph compiles again.
    let exec = engine.compile(&mut graph, "cpu").unwrap();
    assert_eq!(exec.plan().num_blocks(), 2);
}

#[test]
fn test_engines_are_independent() {
    let first = engine();
    let second = engine();
    let (mut g1, _, _) = relu_softmax_chain(false);
    let (mut g2, _, _) = relu_softmax_chain(false);
    let _a = first.compile(&mut g1, "cpu").unwrap();
    let _b = second.compile(&mut g2, "cpu").unwrap();
    assert_eq!(first.arena().lock().unwrap().live_allocations(), 1);
    assert_eq!(second.arena().lock().unwrap().live_allocations(), 1);
}
