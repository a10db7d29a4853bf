//! Crate-wide error types.
//!
//! Structural problems in caller-supplied graphs are recoverable and
//! surface as [`ReachError`]. Invariant violations inside the analysis
//! (malformed ASTs that upstream normalization should have rejected)
//! are programming bugs and panic with a descriptive message instead.

use crate::cfg::CfgNodeId;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReachError>;

/// Errors produced while validating analysis inputs.
#[derive(Debug, thiserror::Error)]
pub enum ReachError {
    /// Entry node ID does not exist in the graph.
    #[error("Entry node {0:?} not found in graph")]
    InvalidEntry(CfgNodeId),

    /// The implicit exit node ID does not exist in the graph.
    #[error("Exit node {0:?} not found in graph")]
    InvalidExit(CfgNodeId),

    /// An edge references a node that does not exist.
    #[error("Edge references non-existent node {0:?}")]
    InvalidEdgeNode(CfgNodeId),

    /// Two CFG nodes claim the same statement.
    #[error("Duplicate CFG node for statement {0}")]
    DuplicateStatement(usize),
}
