//! Arena-backed AST representation.
//!
//! The analysis never owns a full language frontend; it only needs enough
//! node-kind discrimination to implement the per-construct flow rules, plus
//! structural navigation (children, parent, siblings). Nodes live in an
//! arena and are addressed by [`AstId`] handles, so identity comparison is
//! an integer compare rather than a pointer compare.

use serde::{Deserialize, Serialize};

/// Unique identifier for an AST node (index into the owning [`AstArena`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AstId(pub u32);

/// Node kinds the flow functions distinguish.
///
/// This is a closed enum on purpose: every construct gets routed through a
/// single exhaustive `match`, so adding a kind forces every flow function
/// to say how it is handled. Constructs with no special evaluation-order
/// rule are modeled as [`AstKind::Other`] and traversed generically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AstKind {
    /// Script/program root
    Root,
    /// Statement block
    Block,
    /// Function boundary (body is a separate control flow context)
    Function,
    /// Variable reference or binding occurrence
    Name,
    /// `while (cond) body`
    While,
    /// `do body while (cond)`
    DoWhile,
    /// `if (cond) then else`
    If,
    /// `for (init; cond; incr) body`
    For,
    /// `for (lhs in expr) body`
    ForIn,
    /// `for (lhs of expr) body`
    ForOf,
    /// `for await (lhs of expr) body`
    ForAwaitOf,
    /// Short-circuit `&&`
    And,
    /// Short-circuit `||`
    Or,
    /// Short-circuit `??`
    Coalesce,
    /// Optional member access `a?.b`
    OptChainGetProp,
    /// Optional index access `a?.[b]`
    OptChainGetElem,
    /// Optional call `a?.(args)`
    OptChainCall,
    /// Ternary `cond ? t : f`
    Hook,
    /// `var` declaration statement
    VarDecl,
    /// `let` declaration statement
    LetDecl,
    /// `const` declaration statement
    ConstDecl,
    /// Destructuring declarator: pattern child then value child
    DestructuringLhs,
    /// Default value in a pattern: target child then default expression
    DefaultValue,
    /// Array destructuring pattern
    ArrayPattern,
    /// Object destructuring pattern
    ObjectPattern,
    /// Simple assignment `lhs = rhs`
    Assign,
    /// Compound assignment that also reads the target (`+=`, `-=`, ...)
    AssignOp,
    /// Call expression: callee child then argument children
    Call,
    /// Any construct with no dedicated flow rule; traversed generically
    Other,
}

/// One node in the arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AstNode {
    kind: AstKind,
    /// Spelling, present only for `Name` nodes.
    name: Option<String>,
    children: Vec<AstId>,
    parent: Option<AstId>,
}

/// Owning arena for AST nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AstArena {
    nodes: Vec<AstNode>,
}

impl AstArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with the given children. Children must already be in the
    /// arena and must not have a parent yet.
    pub fn add(&mut self, kind: AstKind, children: &[AstId]) -> AstId {
        let id = AstId(self.nodes.len() as u32);
        for &child in children {
            let slot = &mut self.nodes[child.0 as usize].parent;
            assert!(slot.is_none(), "AST node {child:?} already has a parent");
            *slot = Some(id);
        }
        self.nodes.push(AstNode {
            kind,
            name: None,
            children: children.to_vec(),
            parent: None,
        });
        id
    }

    /// Add a leaf `Name` node with the given spelling.
    pub fn add_name(&mut self, name: &str) -> AstId {
        self.add_name_with(name, &[])
    }

    /// Add a `Name` node with children, e.g. a declarator carrying its
    /// initializer expression.
    pub fn add_name_with(&mut self, name: &str, children: &[AstId]) -> AstId {
        let id = AstId(self.nodes.len() as u32);
        for &child in children {
            let slot = &mut self.nodes[child.0 as usize].parent;
            assert!(slot.is_none(), "AST node {child:?} already has a parent");
            *slot = Some(id);
        }
        self.nodes.push(AstNode {
            kind: AstKind::Name,
            name: Some(name.to_string()),
            children: children.to_vec(),
            parent: None,
        });
        id
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: AstId) -> &AstNode {
        &self.nodes[id.0 as usize]
    }

    /// Kind of a node.
    #[inline]
    pub fn kind(&self, id: AstId) -> AstKind {
        self.node(id).kind
    }

    /// Spelling of a `Name` node.
    ///
    /// # Panics
    ///
    /// Panics when called on a node that is not a `Name`.
    pub fn name(&self, id: AstId) -> &str {
        self.node(id)
            .name
            .as_deref()
            .unwrap_or_else(|| panic!("AST node {id:?} ({:?}) has no name", self.kind(id)))
    }

    /// Children of a node, in source evaluation order.
    #[inline]
    pub fn children(&self, id: AstId) -> &[AstId] {
        &self.node(id).children
    }

    /// First child, if any.
    pub fn first_child(&self, id: AstId) -> Option<AstId> {
        self.node(id).children.first().copied()
    }

    /// Last child, if any.
    pub fn last_child(&self, id: AstId) -> Option<AstId> {
        self.node(id).children.last().copied()
    }

    /// Parent node, `None` for roots.
    pub fn parent(&self, id: AstId) -> Option<AstId> {
        self.node(id).parent
    }

    /// Next sibling under the same parent, if any.
    pub fn next_sibling(&self, id: AstId) -> Option<AstId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    /// Whether the node is a `Name`.
    #[inline]
    pub fn is_name(&self, id: AstId) -> bool {
        self.kind(id) == AstKind::Name
    }

    /// Whether the node is an array or object destructuring pattern.
    pub fn is_destructuring_pattern(&self, id: AstId) -> bool {
        matches!(self.kind(id), AstKind::ArrayPattern | AstKind::ObjectPattern)
    }

    /// Whether the node is a destructuring declarator (`DestructuringLhs`).
    pub fn is_destructuring_lhs(&self, id: AstId) -> bool {
        self.kind(id) == AstKind::DestructuringLhs
    }

    /// Whether the node is a `var`/`let`/`const` declaration statement.
    pub fn is_name_declaration(&self, id: AstId) -> bool {
        matches!(
            self.kind(id),
            AstKind::VarDecl | AstKind::LetDecl | AstKind::ConstDecl
        )
    }

    /// Whether the node is an assignment operator with a writable target.
    pub fn is_assignment_op(&self, id: AstId) -> bool {
        matches!(self.kind(id), AstKind::Assign | AstKind::AssignOp)
    }

    /// Whether a `Name` sits in write position inside a destructuring
    /// pattern (as opposed to read position).
    pub fn is_lhs_by_destructuring(&self, id: AstId) -> bool {
        match self.parent(id) {
            Some(p) => self.is_destructuring_pattern(p),
            None => false,
        }
    }

    /// Condition expression of a loop or `if` construct.
    ///
    /// # Panics
    ///
    /// Panics when the node is not a conditional construct or the condition
    /// child is missing, which indicates a malformed AST.
    pub fn condition_expression(&self, id: AstId) -> AstId {
        let found = match self.kind(id) {
            AstKind::If | AstKind::While => self.first_child(id),
            AstKind::DoWhile => self.last_child(id),
            // for (init; cond; incr) body
            AstKind::For => self.children(id).get(1).copied(),
            other => panic!("node {id:?} ({other:?}) has no condition expression"),
        };
        found.unwrap_or_else(|| panic!("conditional node {id:?} is missing its condition child"))
    }
}
