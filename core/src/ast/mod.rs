//! The AST model (§4.1): a closed family of node variants over an arena,
//! with a uniform child-enumeration/visitor interface and no execution
//! state of its own.
//!
//! Nodes live in a single [`Ast`] arena addressed by [`NodeId`], the same
//! "index instead of pointer" discipline the teacher uses throughout
//! (`NamespaceId`, `StringId`, `HeapId`): it sidesteps self-referential
//! borrow issues and is exactly the shape CompactAST decodes into (§4.2.2
//! builds nodes by index before any linking happens). Each node owns its
//! children exclusively (§3.1); named slots are plain accessor methods over
//! [`NodeData`]'s typed fields rather than a second, parallel children list,
//! so there is only ever one place a child id is stored.

mod literal;
mod node;
mod operator;
mod visitor;

pub use literal::{Literal, ValueTag};
pub use node::{NodeFlags, NodeKind};
pub use operator::{AssignOperator, BinaryOperator, UnaryOperator};
pub use visitor::AstVisitor;

use std::str::FromStr;

/// Index into an [`Ast`] arena. Node index 0 is always the tree's root
/// (§4.2.1 rule 1), and the decoder refuses to ever make it a child
/// (§4.2.2, §8 invariant 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    #[must_use]
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}

/// One AST node: its kind, flags, optional literal, and typed child slots.
#[derive(Debug, Clone)]
pub struct AstNode {
    pub kind: NodeKind,
    pub flags: NodeFlags,
    pub value: Option<Literal>,
    pub data: NodeData,
}

impl AstNode {
    #[must_use]
    pub fn new(kind: NodeKind, value: Option<Literal>, data: NodeData) -> Self {
        let mut flags = NodeFlags::empty();
        if value.is_some() {
            flags |= NodeFlags::HAS_VALUE;
        }
        if !data.children().is_empty() {
            flags |= NodeFlags::HAS_CHILDREN;
        }
        Self {
            kind,
            flags,
            value,
            data,
        }
    }

    /// Every child of this node, in canonical order (named slots first,
    /// generic trailing children last), matching §3.1's ordering invariant.
    #[must_use]
    pub fn children(&self) -> Vec<NodeId> {
        self.data.children()
    }

    /// Parses this node's string literal as a binary operator. Valid only
    /// for `BinaryOp` nodes; see module docs for why the operator rides in
    /// the generic `value` slot instead of a dedicated wire field.
    #[must_use]
    pub fn binary_operator(&self) -> Option<BinaryOperator> {
        match &self.value {
            Some(Literal::String(s)) => BinaryOperator::from_str(s).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn unary_operator(&self) -> Option<UnaryOperator> {
        match &self.value {
            Some(Literal::String(s)) => UnaryOperator::from_str(s).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn assign_operator(&self) -> Option<AssignOperator> {
        match &self.value {
            Some(Literal::String(s)) => AssignOperator::from_str(s).ok(),
            _ => None,
        }
    }

    /// The identifier/member/type name carried by name-bearing nodes
    /// (`Identifier`, `Declarator`, `Param`, `Type`, ...).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.value {
            Some(Literal::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Typed child slots per node-kind family. See §3.1's named-slot table for
/// the canonical ordering each variant below projects.
#[derive(Debug, Clone)]
pub enum NodeData {
    Program {
        body: Vec<NodeId>,
    },
    ErrorNode,
    Comment,

    Compound {
        body: Vec<NodeId>,
    },
    ExpressionStmt {
        expr: NodeId,
    },
    If {
        condition: NodeId,
        consequent: NodeId,
        alternate: Option<NodeId>,
    },
    While {
        condition: NodeId,
        body: NodeId,
    },
    DoWhile {
        condition: NodeId,
        body: NodeId,
    },
    For {
        init: Option<NodeId>,
        condition: Option<NodeId>,
        increment: Option<NodeId>,
        body: NodeId,
    },
    RangeFor {
        binding: NodeId,
        iterable: NodeId,
        body: NodeId,
    },
    Switch {
        discriminant: NodeId,
        cases: Vec<NodeId>,
    },
    /// `test == None` marks the `default:` case (§4.3.3).
    Case {
        test: Option<NodeId>,
        body: Vec<NodeId>,
    },
    Return {
        value: Option<NodeId>,
    },
    Break,
    Continue,
    Empty,

    VarDecl {
        var_type: NodeId,
        declarators: Vec<NodeId>,
    },
    FuncDef {
        return_type: NodeId,
        params: Vec<NodeId>,
        body: NodeId,
    },
    FuncDecl {
        return_type: NodeId,
        params: Vec<NodeId>,
    },
    StructDecl {
        fields: Vec<NodeId>,
    },
    TypedefDecl {
        underlying: NodeId,
    },

    BinaryOp {
        left: NodeId,
        right: NodeId,
    },
    UnaryOp {
        operand: NodeId,
        prefix: bool,
    },
    Assignment {
        target: NodeId,
        value: NodeId,
    },
    FuncCall {
        callee: NodeId,
        args: Vec<NodeId>,
    },
    MemberAccess {
        object: NodeId,
        property: NodeId,
    },
    ArrayAccess {
        array: NodeId,
        index: NodeId,
    },
    ConstructorCall {
        type_name: NodeId,
        args: Vec<NodeId>,
    },
    Postfix {
        operand: NodeId,
    },
    Ternary {
        condition: NodeId,
        consequent: NodeId,
        alternate: NodeId,
    },
    Comma {
        items: Vec<NodeId>,
    },

    /// Name-bearing leaf with no children of its own: `Identifier`, `Type`,
    /// `StructType`. The name itself lives in `AstNode::value` (a
    /// `Literal::String`), not here, so there is exactly one place a node's
    /// name is ever stored; see [`AstNode::name`].
    NameRef,
    /// `Number`/`StringLit`/`CharLit`/`Constant`: the literal lives in
    /// `AstNode::value`; this variant just means "no children."
    Leaf,
    /// A declarator's name lives in `AstNode::value`, same as `NameRef`.
    Declarator {
        initializer: Option<NodeId>,
    },
    Param {
        param_type: NodeId,
    },
    FunctionPointerDeclarator {
        params: Vec<NodeId>,
    },
    ArrayDeclarator {
        size: Option<NodeId>,
    },
    ArrayInit {
        elements: Vec<NodeId>,
    },

    /// Forward-compatibility fallback for an unrecognized wire tag
    /// (§4.2.2). Children are kept as an ordered generic list since no
    /// canonical slot layout is known for the unrecognized kind.
    Unknown {
        children: Vec<NodeId>,
    },
}

impl NodeData {
    #[must_use]
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Self::Program { body } | Self::Compound { body } => body.clone(),
            Self::ErrorNode
            | Self::Comment
            | Self::Break
            | Self::Continue
            | Self::Empty
            | Self::NameRef
            | Self::Leaf => vec![],
            Self::ExpressionStmt { expr } => vec![*expr],
            Self::If {
                condition,
                consequent,
                alternate,
            } => {
                let mut v = vec![*condition, *consequent];
                v.extend(*alternate);
                v
            }
            Self::While { condition, body } | Self::DoWhile { condition, body } => {
                vec![*condition, *body]
            }
            Self::For {
                init,
                condition,
                increment,
                body,
            } => {
                let mut v = vec![];
                v.extend(*init);
                v.extend(*condition);
                v.extend(*increment);
                v.push(*body);
                v
            }
            Self::RangeFor {
                binding,
                iterable,
                body,
            } => vec![*binding, *iterable, *body],
            Self::Switch {
                discriminant,
                cases,
            } => {
                let mut v = vec![*discriminant];
                v.extend(cases);
                v
            }
            Self::Case { test, body } => {
                let mut v = vec![];
                v.extend(*test);
                v.extend(body.iter().copied());
                v
            }
            Self::Return { value } => value.iter().copied().collect(),
            Self::VarDecl {
                var_type,
                declarators,
            } => {
                let mut v = vec![*var_type];
                v.extend(declarators);
                v
            }
            Self::FuncDef {
                return_type,
                params,
                body,
            } => {
                let mut v = vec![*return_type];
                v.extend(params);
                v.push(*body);
                v
            }
            Self::FuncDecl {
                return_type,
                params,
            } => {
                let mut v = vec![*return_type];
                v.extend(params);
                v
            }
            Self::StructDecl { fields } => fields.clone(),
            Self::TypedefDecl { underlying } => vec![*underlying],
            Self::BinaryOp { left, right } => vec![*left, *right],
            Self::UnaryOp { operand, .. } | Self::Postfix { operand } => vec![*operand],
            Self::Assignment { target, value } => vec![*target, *value],
            Self::FuncCall { callee, args } => {
                let mut v = vec![*callee];
                v.extend(args);
                v
            }
            Self::MemberAccess { object, property } => vec![*object, *property],
            Self::ArrayAccess { array, index } => vec![*array, *index],
            Self::ConstructorCall { type_name, args } => {
                let mut v = vec![*type_name];
                v.extend(args);
                v
            }
            Self::Ternary {
                condition,
                consequent,
                alternate,
            } => vec![*condition, *consequent, *alternate],
            Self::Comma { items } => items.clone(),
            Self::Declarator { initializer, .. } => initializer.iter().copied().collect(),
            Self::Param { param_type, .. } => vec![*param_type],
            Self::FunctionPointerDeclarator { params, .. } => params.clone(),
            Self::ArrayDeclarator { size, .. } => size.iter().copied().collect(),
            Self::ArrayInit { elements } => elements.clone(),
            Self::Unknown { children } => children.clone(),
        }
    }
}

/// The tree itself: a single arena plus its root. Read-only once built
/// (§5 "The AST is read-only during execution").
#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<AstNode>,
}

impl Ast {
    #[must_use]
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Appends a node and returns its fresh `NodeId`. Callers are
    /// responsible for constructing children before their parent, so that
    /// by the time a parent is pushed every `NodeId` it references already
    /// exists (the same depth-first, children-first discipline the encoder
    /// uses in §4.2.1).
    pub fn push(&mut self, node: AstNode) -> NodeId {
        let id = NodeId::new(u32::try_from(self.nodes.len()).expect("AST exceeds u32 node count"));
        self.nodes.push(node);
        id
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut AstNode {
        &mut self.nodes[id.index()]
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates every node in arena order (`NodeId(0)` first), the order
    /// CompactAST's node table is laid out in.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &AstNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId::new(u32::try_from(i).expect("node index overflow")), n))
    }

    /// Walks the subtree rooted at `root` in depth-first, children-before-
    /// parent order, matching CompactAST's node-collection traversal
    /// (§4.2.1 rule 1). Useful for re-serializing or for any consumer that
    /// wants the same canonical ordering the encoder produces.
    #[must_use]
    pub fn depth_first_post_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((id, visited)) = stack.pop() {
            if visited {
                out.push(id);
                continue;
            }
            stack.push((id, true));
            for child in self.get(id).children() {
                stack.push((child, false));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_parent_invariant_holds_for_simple_tree() {
        let mut ast = Ast::new();
        let num = ast.push(AstNode::new(NodeKind::Number, Some(Literal::UInt8(5)), NodeData::Leaf));
        let decl = ast.push(AstNode::new(
            NodeKind::Declarator,
            Some(Literal::String("x".to_owned())),
            NodeData::Declarator {
                initializer: Some(num),
            },
        ));
        let ty = ast.push(AstNode::new(
            NodeKind::Type,
            Some(Literal::String("int".to_owned())),
            NodeData::NameRef,
        ));
        let var_decl = ast.push(AstNode::new(
            NodeKind::VarDecl,
            None,
            NodeData::VarDecl {
                var_type: ty,
                declarators: vec![decl],
            },
        ));
        assert_eq!(ast.get(var_decl).children(), vec![ty, decl]);
        assert_eq!(ast.get(decl).children(), vec![num]);
    }
}
