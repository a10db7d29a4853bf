//! Fixed-point dataflow analysis over control flow graphs.
//!
//! The centerpiece is a generic, direction-parameterized iterative solver
//! ([`dataflow::solve`]) driven by per-analysis flow functions, together
//! with a backward "may-be reaching use" analysis
//! ([`dataflow::MaybeReachingVariableUse`]) built on top of it: for every
//! definition of a local variable, which later program points might observe
//! the value written there.
//!
//! # Modules
//!
//! - [`ast`]: Arena-backed AST handles and the node-kind taxonomy the flow
//!   functions discriminate on
//! - [`cfg`]: Control flow graph types (nodes, branch-labeled edges,
//!   adjacency caches)
//! - [`scope`]: Variable handles and the per-function variable table
//! - [`pmap`]: Persistent, structurally shared maps and sets backing
//!   lattice elements
//! - [`dataflow`]: Lattice/join abstractions, the fixed-point engine, and
//!   the reaching-use analysis
//!
//! # Example
//!
//! ```
//! use reachflow::ast::{AstArena, AstKind};
//! use reachflow::cfg::{Branch, ControlFlowGraph};
//! use reachflow::dataflow::MaybeReachingVariableUse;
//! use reachflow::scope::VarTable;
//! use rustc_hash::FxHashSet;
//!
//! // a = f(); g(a);
//! let mut ast = AstArena::new();
//! let mut vars = VarTable::new();
//! let a = vars.declare("a");
//!
//! let lhs = ast.add_name("a");
//! let callee = ast.add_name("f");
//! let call = ast.add(AstKind::Call, &[callee]);
//! let def = ast.add(AstKind::Assign, &[lhs, call]);
//!
//! let g = ast.add_name("g");
//! let arg = ast.add_name("a");
//! let use_stmt = ast.add(AstKind::Call, &[g, arg]);
//!
//! let mut cfg = ControlFlowGraph::new();
//! let n_def = cfg.add_node(def);
//! let n_use = cfg.add_node(use_stmt);
//! let exit = cfg.implicit_exit();
//! cfg.set_entry(n_def);
//! cfg.add_edge(n_def, n_use, Branch::Unconditional);
//! cfg.add_edge(n_use, exit, Branch::Unconditional);
//!
//! let escaped = FxHashSet::default();
//! let mut analysis = MaybeReachingVariableUse::new(&cfg, &ast, &vars, &escaped);
//! analysis.analyze();
//! assert_eq!(analysis.get_uses("a", def), vec![use_stmt]);
//! # let _ = a;
//! ```

pub mod ast;
pub mod cfg;
pub mod dataflow;
pub mod error;
pub mod pmap;
pub mod scope;

pub use error::{ReachError, Result};
