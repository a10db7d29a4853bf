//! CFG type definitions.

use once_cell::sync::OnceCell;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::ast::AstId;
use crate::error::{ReachError, Result};

/// Unique identifier for a control flow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CfgNodeId(pub usize);

/// Branch kind labeling an outgoing CFG edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    /// Unconditional transfer (fallthrough, sequential)
    Unconditional,
    /// Taken when the node's condition evaluates true
    OnTrue,
    /// Taken when the node's condition evaluates false
    OnFalse,
    /// Exception transfer; the source node's effect may not have completed
    OnEx,
    /// Synthetic edge added by graph construction (e.g. to the implicit exit)
    Synthetic,
}

/// An edge in the control flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfgEdge {
    /// Source node
    pub from: CfgNodeId,
    /// Target node
    pub to: CfgNodeId,
    /// Branch kind
    pub branch: Branch,
}

impl CfgEdge {
    /// Create a new unconditional edge.
    pub fn unconditional(from: CfgNodeId, to: CfgNodeId) -> Self {
        Self {
            from,
            to,
            branch: Branch::Unconditional,
        }
    }

    /// Create a new edge with a specific branch kind.
    pub fn new(from: CfgNodeId, to: CfgNodeId, branch: Branch) -> Self {
        Self { from, to, branch }
    }
}

/// Cached adjacency lists for O(1) successor/predecessor lookups.
///
/// Built lazily on first access to avoid overhead when not needed. The
/// successor lists carry the branch labels so flow functions can check for
/// exception edges without rescanning the edge list.
#[derive(Debug, Default)]
pub struct AdjacencyCache {
    successors: FxHashMap<CfgNodeId, Vec<(CfgNodeId, Branch)>>,
    predecessors: FxHashMap<CfgNodeId, Vec<CfgNodeId>>,
}

/// Control flow graph over AST statement nodes.
///
/// Each node wraps the [`AstId`] of one statement or boundary expression.
/// A synthetic implicit-exit node (with no statement) is created on demand
/// and serves as the target of return and fallthrough edges.
#[derive(Debug, Default)]
pub struct ControlFlowGraph {
    /// Statement for each node; `None` for the synthetic implicit exit.
    statements: Vec<Option<AstId>>,
    edges: Vec<CfgEdge>,
    entry: Option<CfgNodeId>,
    implicit_exit: Option<CfgNodeId>,
    /// Reverse lookup used by query surfaces keyed on AST nodes.
    ast_to_node: FxHashMap<AstId, CfgNodeId>,
    adjacency_cache: OnceCell<AdjacencyCache>,
}

impl ControlFlowGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a control flow node for the given statement.
    pub fn add_node(&mut self, statement: AstId) -> CfgNodeId {
        let id = CfgNodeId(self.statements.len());
        self.statements.push(Some(statement));
        self.ast_to_node.insert(statement, id);
        self.adjacency_cache = OnceCell::new();
        id
    }

    /// The synthetic exit node, created on first request.
    pub fn implicit_exit(&mut self) -> CfgNodeId {
        if let Some(exit) = self.implicit_exit {
            return exit;
        }
        let id = CfgNodeId(self.statements.len());
        self.statements.push(None);
        self.implicit_exit = Some(id);
        self.adjacency_cache = OnceCell::new();
        id
    }

    /// Mark the entry node.
    pub fn set_entry(&mut self, entry: CfgNodeId) {
        self.entry = Some(entry);
    }

    /// Add an edge.
    pub fn add_edge(&mut self, from: CfgNodeId, to: CfgNodeId, branch: Branch) {
        self.edges.push(CfgEdge::new(from, to, branch));
        self.adjacency_cache = OnceCell::new();
    }

    /// Number of nodes, including the implicit exit if created.
    pub fn node_count(&self) -> usize {
        self.statements.len()
    }

    /// All node ids.
    pub fn node_ids(&self) -> impl Iterator<Item = CfgNodeId> {
        (0..self.statements.len()).map(CfgNodeId)
    }

    /// Entry node.
    ///
    /// # Panics
    ///
    /// Panics when no entry was set; a graph without an entry cannot be
    /// analyzed.
    pub fn entry(&self) -> CfgNodeId {
        self.entry.expect("control flow graph has no entry node")
    }

    /// The implicit exit node, if one was created.
    pub fn exit(&self) -> Option<CfgNodeId> {
        self.implicit_exit
    }

    /// Statement attached to a node; `None` for the implicit exit.
    pub fn statement(&self, id: CfgNodeId) -> Option<AstId> {
        self.statements[id.0]
    }

    /// The control flow node wrapping the given statement, if any.
    pub fn node_for_ast(&self, statement: AstId) -> Option<CfgNodeId> {
        self.ast_to_node.get(&statement).copied()
    }

    /// All edges.
    pub fn edges(&self) -> &[CfgEdge] {
        &self.edges
    }

    fn adjacency(&self) -> &AdjacencyCache {
        self.adjacency_cache.get_or_init(|| {
            let mut cache = AdjacencyCache::default();
            for edge in &self.edges {
                cache
                    .successors
                    .entry(edge.from)
                    .or_default()
                    .push((edge.to, edge.branch));
                cache.predecessors.entry(edge.to).or_default().push(edge.from);
            }
            cache
        })
    }

    /// Successors of a node, with the branch labels of the connecting edges.
    pub fn successors(&self, id: CfgNodeId) -> &[(CfgNodeId, Branch)] {
        self.adjacency()
            .successors
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Predecessors of a node.
    pub fn predecessors(&self, id: CfgNodeId) -> &[CfgNodeId] {
        self.adjacency()
            .predecessors
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether any outgoing edge of the node is an exception edge. Such a
    /// node may or may not complete its effect before control transfers.
    pub fn has_exception_edge(&self, id: CfgNodeId) -> bool {
        self.successors(id)
            .iter()
            .any(|&(_, branch)| branch == Branch::OnEx)
    }

    /// Nodes in reverse postorder from the entry.
    ///
    /// Nodes unreachable from the entry are appended in index order so
    /// every node gets a position. The order only affects how fast a
    /// fixed-point iteration converges, never what it converges to.
    pub fn reverse_postorder(&self) -> Vec<CfgNodeId> {
        let n = self.node_count();
        let mut visited = vec![false; n];
        let mut postorder = Vec::with_capacity(n);
        // Iterative DFS with an explicit stack of (node, next-successor-index).
        let mut stack: Vec<(CfgNodeId, usize)> = Vec::new();
        if let Some(entry) = self.entry {
            visited[entry.0] = true;
            stack.push((entry, 0));
        }
        while let Some(top) = stack.last_mut() {
            let (node, next) = *top;
            let succs = self.successors(node);
            if next < succs.len() {
                top.1 = next + 1;
                let (succ, _) = succs[next];
                if !visited[succ.0] {
                    visited[succ.0] = true;
                    stack.push((succ, 0));
                }
            } else {
                postorder.push(node);
                stack.pop();
            }
        }
        postorder.reverse();
        for id in self.node_ids() {
            if !visited[id.0] {
                postorder.push(id);
            }
        }
        postorder
    }

    /// Check structural consistency: the entry exists and every edge
    /// references a known node.
    pub fn validate(&self) -> Result<()> {
        let n = self.node_count();
        match self.entry {
            Some(entry) if entry.0 >= n => return Err(ReachError::InvalidEntry(entry)),
            None => return Err(ReachError::InvalidEntry(CfgNodeId(n))),
            _ => {}
        }
        if let Some(exit) = self.implicit_exit {
            if exit.0 >= n {
                return Err(ReachError::InvalidExit(exit));
            }
        }
        for edge in &self.edges {
            if edge.from.0 >= n {
                return Err(ReachError::InvalidEdgeNode(edge.from));
            }
            if edge.to.0 >= n {
                return Err(ReachError::InvalidEdgeNode(edge.to));
            }
        }
        let mut seen = FxHashSet::default();
        for statement in self.statements.iter().flatten() {
            if !seen.insert(*statement) {
                return Err(ReachError::DuplicateStatement(statement.0 as usize));
            }
        }
        Ok(())
    }
}
