//! Control flow graph types.
//!
//! The graph itself is built by an external collaborator (a frontend or a
//! test fixture); this crate only reads node identities, branch-labeled
//! outgoing edges, and traversal orders, and attaches per-node analysis
//! annotations in a separate arena.
//!
//! # Modules
//!
//! - [`types`]: Core CFG data structures (nodes, edges, graph, adjacency
//!   cache)

pub mod types;

pub use types::{AdjacencyCache, Branch, CfgEdge, CfgNodeId, ControlFlowGraph};
