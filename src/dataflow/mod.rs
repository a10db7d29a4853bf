//! Dataflow analysis framework.
//!
//! A dataflow analysis assigns every control flow node a pair of lattice
//! elements (the state before and after the node) and iterates flow
//! functions over the graph until a fixed point: reapplying the flow
//! function to every node's current input reproduces its current output.
//!
//! # Modules
//!
//! - [`engine`]: The generic direction-parameterized worklist solver
//! - [`reaching_uses`]: Backward "may-be reaching use" analysis built on
//!   the engine

pub mod engine;
pub mod reaching_uses;

pub use engine::{
    solve, AnalysisMetrics, DataFlowAnalysis, Direction, LinearFlowState, Solution, MAX_STEPS,
};
pub use reaching_uses::{MaybeReachingVariableUse, ReachingUses};

/// A value in a join-semilattice.
///
/// Implementations provide value equality (used solely for the solver's
/// convergence checks) and are joined through a [`FlowJoiner`]. No ordering
/// or hashing is required, and elements embedding graph-node references
/// must not be placed in hash-based containers: equality is a first-class
/// capability here, hashing deliberately is not.
pub trait LatticeElement: Clone + PartialEq {}

/// Two-phase accumulator joining any number of incoming flow states.
///
/// The solver calls [`FlowJoiner::join_flow`] once per relevant neighbor
/// state and [`FlowJoiner::finish`] to obtain the merged result. Zero
/// calls to `join_flow` leave the joiner at its identity (bottom) element,
/// so nodes with no predecessors need no special casing.
pub trait FlowJoiner<L: LatticeElement> {
    /// Fold one incoming state into the accumulator.
    fn join_flow(&mut self, input: &L);

    /// Consume the accumulator, producing the joined element.
    fn finish(self) -> L;
}
