//! Backward "may-be reaching use" analysis.
//!
//! A use of `a` in `g(a)` is a may-be reaching use of the definition at
//! `a = f()` if at least one path from the definition to the end of the
//! function reaches that use with no intervening redefinition of `a`.
//!
//! ```text
//! D1: a = f();
//! U1: g(a);
//!     if (c) {
//!       D2: a = h();
//!       U2: g(a);
//!     }
//! U3: g(a);
//! ```
//!
//! Here the reaching uses of `D1` are `{U1, U3}` and of `D2` are
//! `{U2, U3}`: `U3` is not *guaranteed* to observe `D1`, hence "may be".
//!
//! The analysis walks the CFG bottom-up until the solver reaches a fixed
//! point. At each node it copies the incoming upward-exposed use set, adds
//! newly exposed uses, and removes variables that the node unconditionally
//! redefines. Sub-expressions are visited in reverse of source evaluation
//! order, and a `conditional` flag is threaded through the walk for
//! sub-evaluations that may not execute (short-circuit operands, ternary
//! branches, exception-guarded nodes): kills are suppressed under
//! conditional evaluation because a definition that might not run cannot
//! soundly erase earlier reaching uses.

use crate::ast::{AstArena, AstId, AstKind};
use crate::cfg::{CfgNodeId, ControlFlowGraph};
use crate::dataflow::engine::{
    solve, AnalysisMetrics, DataFlowAnalysis, Direction, Solution,
};
use crate::dataflow::{FlowJoiner, LatticeElement};
use crate::pmap::{PMap, PSet};
use crate::scope::{EscapedSet, VarId, VarTable};

// =============================================================================
// Lattice element
// =============================================================================

/// Product lattice mapping each tracked variable to the set of statement
/// nodes where its current value is upward exposed.
///
/// Elements are immutable values over persistent maps: every operation
/// produces a new version sharing untouched substructure, so the solver
/// can keep one element per CFG node affordably. Equality is per-variable
/// node-set equality (node identity, not structure). There is deliberately
/// no `Hash` implementation: elements are compared, never hashed.
#[derive(Debug, Clone, Default)]
pub struct ReachingUses {
    may_use: PMap<VarId, PSet<AstId>>,
}

impl ReachingUses {
    /// The bottom element: no variable has any exposed use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Statement nodes where `var`'s current value is exposed; empty when
    /// the variable is untracked.
    pub fn get(&self, var: VarId) -> impl Iterator<Item = AstId> + '_ {
        self.may_use
            .get(&var)
            .into_iter()
            .flat_map(|uses| uses.iter().copied())
    }

    /// Record `node` as an exposed use of `var`.
    pub fn put(&mut self, var: VarId, node: AstId) {
        let uses = self.may_use.get(&var).cloned().unwrap_or_default();
        let updated = uses.plus(node);
        if !updated.ptr_eq(&uses) {
            self.may_use = self.may_use.plus(var, updated);
        }
    }

    /// Drop every exposed use of `var` (the variable was redefined).
    pub fn remove_all(&mut self, var: VarId) {
        self.may_use = self.may_use.minus(&var);
    }

    /// Union with another element. The join is a plain union because of
    /// the "may be" nature of the analysis: a use surviving on any path
    /// into a merge point stays exposed.
    pub fn join(&mut self, other: &Self) {
        self.may_use = self
            .may_use
            .reconcile(&other.may_use, |_, ours, theirs| match (ours, theirs) {
                (Some(a), Some(b)) => Some(a.union(b)),
                (Some(a), None) => Some(a.clone()),
                (None, Some(b)) => Some(b.clone()),
                (None, None) => None,
            });
    }

    /// Whether no variable has any exposed use.
    pub fn is_empty(&self) -> bool {
        self.may_use.is_empty()
    }
}

impl PartialEq for ReachingUses {
    fn eq(&self, other: &Self) -> bool {
        self.may_use == other.may_use
    }
}

impl LatticeElement for ReachingUses {}

/// Joiner accumulating a union over any number of incoming states.
#[derive(Default)]
pub struct ReachingUsesJoiner {
    result: ReachingUses,
}

impl FlowJoiner<ReachingUses> for ReachingUsesJoiner {
    fn join_flow(&mut self, input: &ReachingUses) {
        self.result.join(input);
    }

    fn finish(self) -> ReachingUses {
        self.result
    }
}

// =============================================================================
// Analysis
// =============================================================================

/// Computes may-be reaching uses for every definition of each local,
/// non-escaped variable in one function.
pub struct MaybeReachingVariableUse<'a> {
    cfg: &'a ControlFlowGraph,
    ast: &'a AstArena,
    vars: &'a VarTable,
    escaped: &'a EscapedSet,
    solution: Option<Solution<ReachingUses>>,
}

impl<'a> MaybeReachingVariableUse<'a> {
    /// Set up the analysis over a graph, the variables local to the
    /// function, and the caller-computed escaped subset.
    pub fn new(
        cfg: &'a ControlFlowGraph,
        ast: &'a AstArena,
        vars: &'a VarTable,
        escaped: &'a EscapedSet,
    ) -> Self {
        Self {
            cfg,
            ast,
            vars,
            escaped,
            solution: None,
        }
    }

    /// Run the solver to a fixed point (or its step bound). Must be called
    /// before any query.
    pub fn analyze(&mut self) {
        let solution = solve(&*self);
        self.solution = Some(solution);
    }

    /// Statistics of the last [`MaybeReachingVariableUse::analyze`] run.
    ///
    /// # Panics
    ///
    /// Panics when `analyze` has not run yet.
    pub fn metrics(&self) -> &AnalysisMetrics {
        &self.solved().metrics
    }

    /// Statement nodes that may observe the value assigned to `name` at
    /// `def_node`. `def_node` must be the statement of a control flow
    /// node; names that are not tracked locals return no uses.
    ///
    /// Results are read from the solved state at the program point after
    /// the definition, sorted by node id for deterministic output.
    ///
    /// # Panics
    ///
    /// Panics when `analyze` has not run yet or when `def_node` is not a
    /// control flow node — both are caller bugs.
    pub fn get_uses(&self, name: &str, def_node: AstId) -> Vec<AstId> {
        let node = self.cfg.node_for_ast(def_node).unwrap_or_else(|| {
            panic!("definition node {def_node:?} is not a control flow node")
        });
        let state = self.solved().state(node);
        let Some(var) = self.vars.get(name) else {
            return Vec::new();
        };
        let mut uses: Vec<AstId> = state.output.get(var).collect();
        uses.sort_unstable();
        uses
    }

    fn solved(&self) -> &Solution<ReachingUses> {
        self.solution
            .as_ref()
            .expect("analyze() must run before querying the analysis")
    }

    // =========================================================================
    // Flow function
    // =========================================================================

    /// Update `output` with the uses and kills of `n`, a subtree of the
    /// statement at `cfg_stmt`. `conditional` means `n` is not guaranteed
    /// to execute given that the statement executes; conditional kills are
    /// suppressed while uses are still recorded.
    fn compute_may_use(
        &self,
        n: AstId,
        cfg_stmt: AstId,
        output: &mut ReachingUses,
        conditional: bool,
    ) {
        let ast = self.ast;
        match ast.kind(n) {
            // Handled as separate control flow nodes; do not descend.
            AstKind::Root | AstKind::Block | AstKind::Function => {}

            AstKind::Name => {
                if ast.is_lhs_by_destructuring(n) {
                    if !conditional {
                        self.remove_from_use_if_local(ast.name(n), output);
                    }
                } else {
                    self.add_to_use_if_local(ast.name(n), cfg_stmt, output);
                }
            }

            // Only the condition belongs to this node; branches and bodies
            // are separate control flow nodes.
            AstKind::While | AstKind::DoWhile | AstKind::If | AstKind::For => {
                let cond = ast.condition_expression(n);
                self.compute_may_use(cond, cfg_stmt, output, conditional);
            }

            AstKind::ForIn | AstKind::ForOf | AstKind::ForAwaitOf => {
                // for (lhs in/of rhs) { ... }
                let mut lhs = self.child(n, 0);
                let rhs = self.child(n, 1);
                if ast.is_name_declaration(lhs) {
                    // for (let x of y) — unwrap to the bound target
                    lhs = ast
                        .last_child(lhs)
                        .unwrap_or_else(|| panic!("empty declaration in loop head {n:?}"));
                    if ast.is_destructuring_lhs(lhs) {
                        // for (let [x] of y)
                        lhs = self.child(lhs, 0);
                    }
                }
                if ast.is_name(lhs) {
                    if !conditional {
                        self.remove_from_use_if_local(ast.name(lhs), output);
                    }
                } else if ast.is_destructuring_pattern(lhs) {
                    self.compute_may_use(lhs, cfg_stmt, output, true);
                }
                // The iterated expression evaluates before each binding, so
                // the backward walk visits it after the kill.
                self.compute_may_use(rhs, cfg_stmt, output, conditional);
            }

            // The right operand may short-circuit away; the left always
            // evaluates (with the caller's conditionality).
            AstKind::And
            | AstKind::Or
            | AstKind::Coalesce
            | AstKind::OptChainGetProp
            | AstKind::OptChainGetElem => {
                self.compute_may_use(self.child(n, 1), cfg_stmt, output, true);
                self.compute_may_use(self.child(n, 0), cfg_stmt, output, conditional);
            }

            AstKind::OptChainCall => {
                // Arguments evaluate in source order and only if the callee
                // is non-nullish, so they are conditional; the callee is not.
                let children = ast.children(n);
                let (&callee, args) = children
                    .split_first()
                    .unwrap_or_else(|| panic!("optional call {n:?} has no callee"));
                for &arg in args.iter().rev() {
                    self.compute_may_use(arg, cfg_stmt, output, true);
                }
                self.compute_may_use(callee, cfg_stmt, output, conditional);
            }

            AstKind::Hook => {
                self.compute_may_use(self.child(n, 2), cfg_stmt, output, true);
                self.compute_may_use(self.child(n, 1), cfg_stmt, output, true);
                self.compute_may_use(self.child(n, 0), cfg_stmt, output, conditional);
            }

            AstKind::VarDecl | AstKind::LetDecl | AstKind::ConstDecl => {
                assert!(
                    !ast.children(n).is_empty(),
                    "declaration {n:?} has no declarator; the AST should be normalized"
                );
                let declarator = self.child(n, 0);
                if ast.is_destructuring_lhs(declarator) {
                    // Destructuring binds targets after evaluating the
                    // value, so the backward walk visits the pattern first.
                    self.compute_may_use(self.child(declarator, 0), cfg_stmt, output, conditional);
                    self.compute_may_use(self.child(declarator, 1), cfg_stmt, output, conditional);
                } else if let Some(&init) = ast.children(declarator).first() {
                    if !conditional {
                        self.remove_from_use_if_local(ast.name(declarator), output);
                    }
                    self.compute_may_use(init, cfg_stmt, output, conditional);
                }
                // else: declaration without initializer, no effect
            }

            AstKind::DefaultValue => {
                let target = self.child(n, 0);
                let default = self.child(n, 1);
                if ast.is_destructuring_pattern(target) {
                    self.compute_may_use(target, cfg_stmt, output, conditional);
                    self.compute_may_use(default, cfg_stmt, output, true);
                } else if ast.is_name(target) {
                    // Binding the name happens after evaluating the default.
                    if !conditional {
                        self.remove_from_use_if_local(ast.name(target), output);
                    }
                    self.compute_may_use(default, cfg_stmt, output, true);
                } else {
                    self.compute_may_use(default, cfg_stmt, output, true);
                    self.compute_may_use(target, cfg_stmt, output, conditional);
                }
            }

            AstKind::Assign | AstKind::AssignOp => {
                let target = self.child(n, 0);
                if ast.is_name(target) {
                    if !conditional {
                        self.remove_from_use_if_local(ast.name(target), output);
                    }
                    // A compound operator like `+=` also reads the target.
                    if ast.kind(n) == AstKind::AssignOp {
                        self.add_to_use_if_local(ast.name(target), cfg_stmt, output);
                    }
                    self.compute_may_use(self.child(n, 1), cfg_stmt, output, conditional);
                } else if ast.kind(n) == AstKind::Assign && ast.is_destructuring_pattern(target) {
                    // The rhs evaluates before the pattern binds, so the
                    // backward walk visits the pattern first.
                    self.compute_may_use(target, cfg_stmt, output, conditional);
                    self.compute_may_use(self.child(n, 1), cfg_stmt, output, conditional);
                } else {
                    // Assignment through a member or index expression:
                    // nothing to kill, traverse generically.
                    self.visit_children_in_reverse(n, cfg_stmt, output, conditional);
                }
            }

            // Everything else: visit children in reverse order so the last
            // definition in the subtree applies first.
            AstKind::DestructuringLhs
            | AstKind::ArrayPattern
            | AstKind::ObjectPattern
            | AstKind::Call
            | AstKind::Other => {
                self.visit_children_in_reverse(n, cfg_stmt, output, conditional);
            }
        }
    }

    fn visit_children_in_reverse(
        &self,
        n: AstId,
        cfg_stmt: AstId,
        output: &mut ReachingUses,
        conditional: bool,
    ) {
        for &child in self.ast.children(n).iter().rev() {
            self.compute_may_use(child, cfg_stmt, output, conditional);
        }
    }

    fn child(&self, n: AstId, index: usize) -> AstId {
        self.ast.children(n).get(index).copied().unwrap_or_else(|| {
            panic!(
                "node {n:?} ({:?}) is missing child {index}; the AST should be normalized",
                self.ast.kind(n)
            )
        })
    }

    // =========================================================================
    // Escape filtering
    // =========================================================================

    /// Register `node` as a use of the named variable, unless the name is
    /// not local to this function or the variable escaped.
    fn add_to_use_if_local(&self, name: &str, node: AstId, output: &mut ReachingUses) {
        let Some(var) = self.vars.get(name) else {
            return;
        };
        if !self.escaped.contains(&var) {
            output.put(var, node);
        }
    }

    /// Drop all exposed uses of the named variable, unless the name is not
    /// local to this function or the variable escaped.
    fn remove_from_use_if_local(&self, name: &str, output: &mut ReachingUses) {
        let Some(var) = self.vars.get(name) else {
            return;
        };
        if !self.escaped.contains(&var) {
            output.remove_all(var);
        }
    }
}

impl DataFlowAnalysis for MaybeReachingVariableUse<'_> {
    type Lattice = ReachingUses;
    type Joiner = ReachingUsesJoiner;

    fn cfg(&self) -> &ControlFlowGraph {
        self.cfg
    }

    fn direction(&self) -> Direction {
        Direction::Backward
    }

    fn create_entry_lattice(&self) -> ReachingUses {
        ReachingUses::new()
    }

    fn create_initial_estimate(&self) -> ReachingUses {
        ReachingUses::new()
    }

    fn create_flow_joiner(&self) -> ReachingUsesJoiner {
        ReachingUsesJoiner::default()
    }

    fn flow_through(&self, node: CfgNodeId, input: &ReachingUses) -> ReachingUses {
        let Some(stmt) = self.cfg.statement(node) else {
            // Synthetic node (implicit exit): no effect.
            return input.clone();
        };
        let mut output = input.clone();
        // An outgoing exception edge means the node may transfer control
        // before completing its effect; treat its kills as conditional.
        let conditional = self.cfg.has_exception_edge(node);
        self.compute_may_use(stmt, stmt, &mut output, conditional);
        output
    }
}
