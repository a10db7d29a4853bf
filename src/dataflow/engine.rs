//! Generic fixed-point solver.
//!
//! Implements the classic iterative worklist algorithm, parameterized over
//! direction:
//!
//! - Forward: `IN[n] = JOIN(OUT[p])` over predecessors, `OUT[n] = flow(n, IN[n])`
//! - Backward: `OUT[n] = JOIN(IN[s])` over successors, `IN[n] = flow(n, OUT[n])`
//!
//! `IN` and `OUT` keep their program-order meaning in both directions: `IN`
//! is the state at the point before the node executes, `OUT` the state at
//! the point after. Nodes are seeded in an order approximating (reverse)
//! postorder for fast convergence; the order never affects the result,
//! only the iteration count. Iteration stops at a fixed point or after
//! [`MAX_STEPS`] node visits, whichever comes first — exceeding the bound
//! degrades to the best state computed so far rather than failing.

use std::collections::VecDeque;

use fixedbitset::FixedBitSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cfg::{CfgNodeId, ControlFlowGraph};
use crate::dataflow::{FlowJoiner, LatticeElement};

/// Safety valve against pathological graphs. Realistic function bodies
/// (hundreds of CFG nodes) converge within a handful of passes because the
/// lattice only grows by monotone union.
pub const MAX_STEPS: usize = 200_000;

/// Direction of an analysis, fixed per analysis instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Information flows from predecessors to successors.
    Forward,
    /// Information flows from successors to predecessors.
    Backward,
}

/// Per-node annotation: the lattice states at the program points
/// immediately before and after the node.
#[derive(Debug, Clone)]
pub struct LinearFlowState<L> {
    /// State before the node executes.
    pub input: L,
    /// State after the node executes.
    pub output: L,
}

/// A dataflow analysis: flow functions plus lattice construction hooks.
///
/// The engine owns iteration and annotation storage; implementations own
/// the domain semantics.
pub trait DataFlowAnalysis {
    /// Lattice element type this analysis computes over.
    type Lattice: LatticeElement;
    /// Joiner merging neighbor states at control flow merge points.
    type Joiner: FlowJoiner<Self::Lattice>;

    /// The graph being analyzed.
    fn cfg(&self) -> &ControlFlowGraph;

    /// Direction of this analysis.
    fn direction(&self) -> Direction;

    /// Lattice element seeding the boundary node (entry for forward,
    /// implicit exit for backward). Typically the bottom element.
    fn create_entry_lattice(&self) -> Self::Lattice;

    /// Initial estimate for every other node's states.
    fn create_initial_estimate(&self) -> Self::Lattice;

    /// Fresh joiner for one merge.
    fn create_flow_joiner(&self) -> Self::Joiner;

    /// Apply the node's transfer function to the incoming state. For a
    /// backward analysis the "incoming" state is the node's OUT.
    fn flow_through(&self, node: CfgNodeId, input: &Self::Lattice) -> Self::Lattice;
}

/// Summary of one solver run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisMetrics {
    /// Number of CFG nodes annotated.
    pub nodes: usize,
    /// Total node visits performed before reaching a fixed point (or the
    /// step bound).
    pub steps: usize,
    /// Whether a fixed point was reached within [`MAX_STEPS`].
    pub converged: bool,
}

/// Solved annotations, read-only after the engine finishes.
#[derive(Debug, Clone)]
pub struct Solution<L> {
    states: Vec<LinearFlowState<L>>,
    /// Run statistics.
    pub metrics: AnalysisMetrics,
}

impl<L> Solution<L> {
    /// Annotation for one node.
    pub fn state(&self, node: CfgNodeId) -> &LinearFlowState<L> {
        &self.states[node.0]
    }
}

/// Run `analysis` to a fixed point (or the step bound) and return the
/// per-node annotations.
pub fn solve<A: DataFlowAnalysis>(analysis: &A) -> Solution<A::Lattice> {
    let cfg = analysis.cfg();
    let direction = analysis.direction();
    let node_count = cfg.node_count();

    let mut states: Vec<LinearFlowState<A::Lattice>> = (0..node_count)
        .map(|_| LinearFlowState {
            input: analysis.create_initial_estimate(),
            output: analysis.create_initial_estimate(),
        })
        .collect();

    // The boundary node (entry for forward, implicit exit for backward)
    // has no in-direction neighbors inside the graph, so its incoming
    // state stays pinned to the entry lattice instead of being joined.
    // Its transfer function still runs like any other node's.
    let boundary = match direction {
        Direction::Forward => Some(cfg.entry()),
        Direction::Backward => cfg.exit(),
    };
    if let Some(b) = boundary {
        states[b.0].input = analysis.create_entry_lattice();
        states[b.0].output = analysis.create_entry_lattice();
    }

    // Seed the worklist in an order approximating reverse postorder for
    // the chosen direction.
    let mut order = cfg.reverse_postorder();
    if direction == Direction::Backward {
        order.reverse();
    }
    let mut worklist: VecDeque<CfgNodeId> = order.into_iter().collect();
    let mut queued = FixedBitSet::with_capacity(node_count);
    for &n in &worklist {
        queued.insert(n.0);
    }

    debug!(nodes = node_count, ?direction, "starting fixed-point iteration");

    let mut steps = 0usize;
    let mut converged = true;
    while let Some(node) = worklist.pop_front() {
        queued.set(node.0, false);
        steps += 1;
        if steps > MAX_STEPS {
            warn!(
                steps,
                "fixed point not reached within step bound; \
                 returning last computed (over-approximate) states"
            );
            converged = false;
            break;
        }

        match direction {
            Direction::Backward => {
                let out = if Some(node) == boundary {
                    states[node.0].output.clone()
                } else {
                    let mut joiner = analysis.create_flow_joiner();
                    for &(succ, _) in cfg.successors(node) {
                        joiner.join_flow(&states[succ.0].input);
                    }
                    joiner.finish()
                };
                let new_in = analysis.flow_through(node, &out);
                states[node.0].output = out;
                if new_in != states[node.0].input {
                    states[node.0].input = new_in;
                    for &pred in cfg.predecessors(node) {
                        if !queued.contains(pred.0) {
                            queued.insert(pred.0);
                            worklist.push_back(pred);
                        }
                    }
                }
            }
            Direction::Forward => {
                let input = if Some(node) == boundary {
                    states[node.0].input.clone()
                } else {
                    let mut joiner = analysis.create_flow_joiner();
                    for &pred in cfg.predecessors(node) {
                        joiner.join_flow(&states[pred.0].output);
                    }
                    joiner.finish()
                };
                let new_out = analysis.flow_through(node, &input);
                states[node.0].input = input;
                if new_out != states[node.0].output {
                    states[node.0].output = new_out;
                    for &(succ, _) in cfg.successors(node) {
                        if !queued.contains(succ.0) {
                            queued.insert(succ.0);
                            worklist.push_back(succ);
                        }
                    }
                }
            }
        }
    }

    debug!(steps, converged, "fixed-point iteration finished");

    Solution {
        states,
        metrics: AnalysisMetrics {
            nodes: node_count,
            steps,
            converged,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstArena, AstKind};
    use crate::cfg::Branch;
    use crate::pmap::PSet;

    /// Toy forward analysis: each node's OUT is the union of its IN and
    /// its own id. Converges to "the set of nodes on some path from the
    /// entry to this point".
    struct ReachableNodes<'a> {
        cfg: &'a ControlFlowGraph,
    }

    #[derive(Debug, Clone, PartialEq, Default)]
    struct NodeSet(PSet<usize>);

    impl LatticeElement for NodeSet {}

    #[derive(Default)]
    struct NodeSetJoiner(NodeSet);

    impl FlowJoiner<NodeSet> for NodeSetJoiner {
        fn join_flow(&mut self, input: &NodeSet) {
            self.0 .0 = self.0 .0.union(&input.0);
        }
        fn finish(self) -> NodeSet {
            self.0
        }
    }

    impl DataFlowAnalysis for ReachableNodes<'_> {
        type Lattice = NodeSet;
        type Joiner = NodeSetJoiner;

        fn cfg(&self) -> &ControlFlowGraph {
            self.cfg
        }
        fn direction(&self) -> Direction {
            Direction::Forward
        }
        fn create_entry_lattice(&self) -> NodeSet {
            NodeSet::default()
        }
        fn create_initial_estimate(&self) -> NodeSet {
            NodeSet::default()
        }
        fn create_flow_joiner(&self) -> NodeSetJoiner {
            NodeSetJoiner::default()
        }
        fn flow_through(&self, node: CfgNodeId, input: &NodeSet) -> NodeSet {
            NodeSet(input.0.plus(node.0))
        }
    }

    fn looped_cfg() -> ControlFlowGraph {
        // entry -> header <-> body, header -> exit
        let mut ast = AstArena::new();
        let stmts: Vec<_> = (0..3).map(|_| ast.add(AstKind::Other, &[])).collect();
        let mut cfg = ControlFlowGraph::new();
        let entry = cfg.add_node(stmts[0]);
        let header = cfg.add_node(stmts[1]);
        let body = cfg.add_node(stmts[2]);
        let exit = cfg.implicit_exit();
        cfg.set_entry(entry);
        cfg.add_edge(entry, header, Branch::Unconditional);
        cfg.add_edge(header, body, Branch::OnTrue);
        cfg.add_edge(body, header, Branch::Unconditional);
        cfg.add_edge(header, exit, Branch::OnFalse);
        cfg
    }

    #[test]
    fn forward_solver_reaches_fixpoint_despite_back_edge() {
        let cfg = looped_cfg();
        let analysis = ReachableNodes { cfg: &cfg };
        let solution = solve(&analysis);
        assert!(solution.metrics.converged);

        // The loop header's OUT accumulates the entry's id, its own id,
        // and the body's id once the back edge has been propagated.
        let header_out = &solution.state(CfgNodeId(1)).output;
        assert!(header_out.0.contains(&0));
        assert!(header_out.0.contains(&1));
        assert!(header_out.0.contains(&2));
        // The entry's IN stays pinned at the seed, but its own transfer
        // function still applies.
        assert!(solution.state(CfgNodeId(0)).input.0.is_empty());
        assert!(solution.state(CfgNodeId(0)).output.0.contains(&0));
    }

    #[test]
    fn forward_entry_transfer_function_propagates() {
        // entry -> n1 -> exit: the entry's own effect must be visible in
        // its OUT and in every downstream IN.
        let mut ast = AstArena::new();
        let s0 = ast.add(AstKind::Other, &[]);
        let s1 = ast.add(AstKind::Other, &[]);
        let mut cfg = ControlFlowGraph::new();
        let entry = cfg.add_node(s0);
        let n1 = cfg.add_node(s1);
        let exit = cfg.implicit_exit();
        cfg.set_entry(entry);
        cfg.add_edge(entry, n1, Branch::Unconditional);
        cfg.add_edge(n1, exit, Branch::Unconditional);

        let analysis = ReachableNodes { cfg: &cfg };
        let solution = solve(&analysis);
        assert!(solution.state(entry).output.0.contains(&entry.0));
        assert!(solution.state(n1).input.0.contains(&entry.0));
        assert!(solution.state(n1).output.0.contains(&n1.0));
    }

    #[test]
    fn solved_states_satisfy_flow_equations() {
        let cfg = looped_cfg();
        let analysis = ReachableNodes { cfg: &cfg };
        let solution = solve(&analysis);

        for node in cfg.node_ids() {
            let state = solution.state(node);
            let replayed = analysis.flow_through(node, &state.input);
            assert_eq!(
                replayed, state.output,
                "node {node:?} does not satisfy its flow equation"
            );
        }
    }

    #[test]
    fn metrics_report_steps() {
        let cfg = looped_cfg();
        let analysis = ReachableNodes { cfg: &cfg };
        let solution = solve(&analysis);
        assert_eq!(solution.metrics.nodes, 4);
        assert!(solution.metrics.steps >= 4, "every node is visited at least once");
        let json = serde_json::to_value(&solution.metrics).unwrap();
        assert_eq!(json["converged"], true);
    }
}
