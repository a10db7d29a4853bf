//! Variable handles and the per-function variable table.
//!
//! Scope resolution happens upstream; the analysis only consumes the set of
//! variables local to the function under analysis, keyed by spelling, plus
//! the caller-owned subset of escaped variables. Variables are arena
//! handles, not name strings, so two same-spelled variables in different
//! scopes stay distinct.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Unique identifier for a local variable (index into the [`VarTable`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(pub u32);

/// The set of variables that may be observed or written outside
/// straight-line control flow (closure captures and the like). These are
/// excluded from precise tracking; callers must treat them conservatively.
pub type EscapedSet = FxHashSet<VarId>;

/// All variables local to one function, looked up by spelling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VarTable {
    names: Vec<String>,
    by_name: FxHashMap<String, VarId>,
}

impl VarTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable, returning its handle. Re-declaring a spelling
    /// returns the existing handle.
    pub fn declare(&mut self, name: &str) -> VarId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = VarId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Look up a variable by spelling. `None` means the name is not local
    /// to this function.
    pub fn get(&self, name: &str) -> Option<VarId> {
        self.by_name.get(name).copied()
    }

    /// Spelling of a variable.
    pub fn name(&self, id: VarId) -> &str {
        &self.names[id.0 as usize]
    }

    /// Number of declared variables.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All variable handles.
    pub fn iter(&self) -> impl Iterator<Item = VarId> {
        (0..self.names.len() as u32).map(VarId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_and_lookup() {
        let mut vars = VarTable::new();
        let a = vars.declare("a");
        let b = vars.declare("b");
        assert_ne!(a, b);
        assert_eq!(vars.get("a"), Some(a));
        assert_eq!(vars.get("missing"), None);
        assert_eq!(vars.name(b), "b");
    }

    #[test]
    fn redeclare_returns_same_handle() {
        let mut vars = VarTable::new();
        let a1 = vars.declare("a");
        let a2 = vars.declare("a");
        assert_eq!(a1, a2);
        assert_eq!(vars.len(), 1);
    }
}
